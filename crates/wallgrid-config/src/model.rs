//! Declarative configuration model
//!
//! Typed view of the platform YAML. All types are plain data; the loader
//! is the only producer and a produced [`ConfigSnapshot`] is never
//! mutated, only replaced wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::derived::DerivedMetrics;

/// Codec selection per output class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecPolicy {
    #[serde(default = "default_tiles_codec")]
    pub tiles: String,
    #[serde(default = "default_mosaics_codec")]
    pub mosaics: String,
}

fn default_tiles_codec() -> String {
    "h264".to_string()
}

fn default_mosaics_codec() -> String {
    "hevc".to_string()
}

impl Default for CodecPolicy {
    fn default() -> Self {
        Self {
            tiles: default_tiles_codec(),
            mosaics: default_mosaics_codec(),
        }
    }
}

/// Latency budgets per wall latency class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyClasses {
    #[serde(default = "default_interactive_ms")]
    pub interactive_max_ms: u32,
    #[serde(default = "default_broadcast_ms")]
    pub broadcast_max_ms: u32,
}

fn default_interactive_ms() -> u32 {
    500
}

fn default_broadcast_ms() -> u32 {
    6000
}

impl Default for LatencyClasses {
    fn default() -> Self {
        Self {
            interactive_max_ms: default_interactive_ms(),
            broadcast_max_ms: default_broadcast_ms(),
        }
    }
}

/// Platform-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_max_streams")]
    pub max_concurrent_streams: u32,
    #[serde(default)]
    pub codec_policy: CodecPolicy,
    #[serde(default)]
    pub latency_classes: LatencyClasses,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

fn default_max_streams() -> u32 {
    64
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            max_concurrent_streams: default_max_streams(),
            codec_policy: CodecPolicy::default(),
            latency_classes: LatencyClasses::default(),
        }
    }
}

/// Tile grid of a tiled wall
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WallGrid {
    pub rows: u32,
    pub cols: u32,
}

/// One wall as declared in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallSpec {
    pub id: String,
    #[serde(rename = "type", default = "default_wall_kind")]
    pub kind: String,
    #[serde(default = "default_classification")]
    pub classification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<WallGrid>,
    #[serde(default = "default_screens")]
    pub screens: u32,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_latency_class")]
    pub latency_class: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn default_wall_kind() -> String {
    "tiles".to_string()
}

fn default_classification() -> String {
    "unclassified".to_string()
}

fn default_screens() -> u32 {
    1
}

fn default_resolution() -> String {
    "1920x1080".to_string()
}

fn default_latency_class() -> String {
    "interactive".to_string()
}

impl WallSpec {
    /// Number of display endpoints this wall drives.
    pub fn tile_count(&self) -> u32 {
        if self.kind == "tiles" {
            if let Some(grid) = &self.grid {
                return grid.rows * grid.cols;
            }
        }
        self.screens
    }
}

/// One source as declared in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    #[serde(rename = "type", default = "default_source_kind")]
    pub kind: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub codec: String,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub bitrate_kbps: u32,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn default_source_kind() -> String {
    "webrtc".to_string()
}

/// One access rule. `when` is a conjunction of named conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    #[serde(default = "default_effect")]
    pub effect: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub when: BTreeMap<String, serde_json::Value>,
}

fn default_effect() -> String {
    "deny".to_string()
}

/// Access policy: taxonomy, ordered rules, explicit allow list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySpec {
    #[serde(default)]
    pub taxonomy: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    #[serde(default)]
    pub allow_list: Vec<serde_json::Value>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

/// Raw typed document as deserialized from validated YAML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub platform: Option<PlatformSettings>,
    #[serde(default)]
    pub walls: Vec<WallSpec>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub policy: PolicySpec,
}

/// Immutable snapshot of a successfully loaded configuration
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub platform: PlatformSettings,
    pub walls: Vec<WallSpec>,
    pub sources: Vec<SourceSpec>,
    pub policy: PolicySpec,
    pub derived: DerivedMetrics,
    pub canonical_json: String,
    pub raw_yaml: String,
    pub loaded_from: String,
    pub loaded_at: DateTime<Utc>,
}

impl ConfigSnapshot {
    pub fn get_wall(&self, wall_id: &str) -> Option<&WallSpec> {
        self.walls.iter().find(|w| w.id == wall_id)
    }

    pub fn get_source(&self, source_id: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.id == source_id)
    }

    pub fn config_hash(&self) -> &str {
        &self.derived.config_hash
    }
}
