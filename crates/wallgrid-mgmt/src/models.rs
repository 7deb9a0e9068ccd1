//! API and storage models
//!
//! Walls, sources, and layouts with their input variants, plus the DTOs
//! of the policy proxy, token minting, bundle, and whoami surfaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const WALL_TYPES: &[&str] = &["tilewall", "bigscreen"];
pub const SOURCE_TYPES: &[&str] = &["vdi", "hdmi"];
pub const PROTOCOLS: &[&str] = &["rtsp", "rtp", "srt", "webrtc", "http", "other"];

/// A display wall
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wall {
    pub id: i32,
    pub name: String,
    pub wall_type: String,
    pub tile_count: i32,
    pub resolution: String,
    pub tags: Vec<String>,
}

/// Wall creation/update payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallIn {
    pub name: String,
    pub wall_type: String,
    pub tile_count: i32,
    pub resolution: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl WallIn {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !WALL_TYPES.contains(&self.wall_type.as_str()) {
            return Err(ApiError::Unprocessable(format!(
                "invalid_wall_type:{}",
                self.wall_type
            )));
        }
        if self.tile_count < 1 {
            return Err(ApiError::Unprocessable("tile_count_must_be_positive".into()));
        }
        Ok(())
    }
}

/// A video source
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Source {
    pub id: i32,
    pub name: String,
    pub source_type: String,
    pub protocol: String,
    pub endpoint_url: String,
    pub codec: String,
    pub tags: Vec<String>,
    pub health_status: String,
}

/// Source creation/update payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceIn {
    pub name: String,
    pub source_type: String,
    pub protocol: String,
    pub endpoint_url: String,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_health")]
    pub health_status: String,
}

fn default_codec() -> String {
    "h264".to_string()
}

fn default_health() -> String {
    "unknown".to_string()
}

impl SourceIn {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !SOURCE_TYPES.contains(&self.source_type.as_str()) {
            return Err(ApiError::Unprocessable(format!(
                "invalid_source_type:{}",
                self.source_type
            )));
        }
        if !PROTOCOLS.contains(&self.protocol.as_str()) {
            return Err(ApiError::Unprocessable(format!(
                "invalid_protocol:{}",
                self.protocol
            )));
        }
        Ok(())
    }
}

/// A versioned layout of sources on a wall
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Layout {
    pub id: i32,
    pub wall_id: i32,
    pub name: String,
    pub version: i32,
    pub grid_config: serde_json::Value,
    pub preset_name: String,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Layout creation/update payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutIn {
    pub wall_id: i32,
    pub name: String,
    pub grid_config: serde_json::Value,
    #[serde(default)]
    pub preset_name: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Policy evaluation request forwarded to the Policy Engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvalRequest {
    pub wall_id: i64,
    pub source_id: i64,
    pub operator_id: String,
    #[serde(default)]
    pub operator_roles: Vec<String>,
    #[serde(default)]
    pub operator_tags: Vec<String>,
}

/// Policy Engine decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvalResponse {
    pub allowed: bool,
    pub reason: String,
    #[serde(default)]
    pub matched_rules: Vec<serde_json::Value>,
}

/// Stream token request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSubscribeRequest {
    pub wall_id: i64,
    pub source_id: i64,
    pub tile_id: String,
}

/// Stream token response; `token` is set only when allowed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSubscribeResponse {
    pub allowed: bool,
    pub reason: String,
    pub token: Option<String>,
}

/// Bundle snapshot of walls, sources, and active layouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleExport {
    pub walls: Vec<Wall>,
    pub sources: Vec<Source>,
    pub active_layouts: Vec<Layout>,
}

/// Bundle import request; `ring` names the rollout cohort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleImportRequest {
    pub ring: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub hmac_hex: Option<String>,
}

pub const RINGS: &[&str] = &["dev", "test", "prod"];

impl BundleImportRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !RINGS.contains(&self.ring.as_str()) {
            return Err(ApiError::Unprocessable(format!("invalid_ring:{}", self.ring)));
        }
        Ok(())
    }
}

/// Verified identity echo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoAmI {
    pub sub: String,
    pub preferred_username: String,
    pub roles: Vec<String>,
    pub claims: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_wall_in_validation() {
        let wall = WallIn {
            name: "ops".into(),
            wall_type: "tilewall".into(),
            tile_count: 24,
            resolution: "1920x1080".into(),
            tags: vec![],
        };
        assert!(wall.validate().is_ok());

        let bad_type = WallIn { wall_type: "curved".into(), ..wall.clone() };
        assert!(bad_type.validate().is_err());

        let bad_count = WallIn { tile_count: 0, ..wall };
        assert!(bad_count.validate().is_err());
    }

    #[test]
    fn test_source_in_validation() {
        let source = SourceIn {
            name: "cam-1".into(),
            source_type: "hdmi".into(),
            protocol: "srt".into(),
            endpoint_url: "srt://10.0.0.1:9000".into(),
            codec: default_codec(),
            tags: vec![],
            health_status: default_health(),
        };
        assert!(source.validate().is_ok());

        let bad = SourceIn { protocol: "carrier-pigeon".into(), ..source };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_bundle_ring_validation() {
        let req = BundleImportRequest {
            ring: "prod".into(),
            payload: serde_json::json!({}),
            hmac_hex: None,
        };
        assert!(req.validate().is_ok());

        let bad = BundleImportRequest { ring: "canary".into(), ..req };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_source_in_defaults() {
        let source: SourceIn = serde_json::from_str(
            r#"{"name":"s","source_type":"vdi","protocol":"webrtc","endpoint_url":""}"#,
        )
        .unwrap();
        assert_eq!(source.codec, "h264");
        assert_eq!(source.health_status, "unknown");
    }
}
