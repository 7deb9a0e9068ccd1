//! Configuration loader
//!
//! YAML bytes in, validated [`ConfigSnapshot`] out. A failing load returns
//! the full error list and produces nothing; it never touches a previously
//! published snapshot.

use chrono::Utc;
use serde_json::Value;
use std::path::Path;
use tracing::info;

use wallgrid_common::canonical_json;

use crate::derived::DerivedMetrics;
use crate::error::{ConfigError, Result};
use crate::model::{ConfigDocument, ConfigSnapshot};
use crate::schema::validate_schema;
use crate::validate::validate_semantic;

/// Parse and validate YAML text into a snapshot.
pub fn load_config(yaml_text: &str, source_path: &str) -> Result<ConfigSnapshot> {
    let doc: Value = serde_yaml::from_str(yaml_text)
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    if !doc.is_object() {
        return Err(ConfigError::Rejected(vec![
            "Config must be a YAML mapping".to_string(),
        ]));
    }

    let schema_errors = validate_schema(&doc);
    if !schema_errors.is_empty() {
        return Err(ConfigError::Rejected(schema_errors));
    }

    let semantic_errors = validate_semantic(&doc);
    if !semantic_errors.is_empty() {
        return Err(ConfigError::Rejected(semantic_errors));
    }

    let typed: ConfigDocument = serde_json::from_value(doc.clone())
        .map_err(|e| ConfigError::Rejected(vec![e.to_string()]))?;
    let platform = typed.platform.unwrap_or_default();

    let canonical = canonical_json(&doc);
    let derived = DerivedMetrics::compute(&platform, &typed.walls, &typed.sources, &canonical);

    if derived.worst_case_concurrency > platform.max_concurrent_streams {
        return Err(ConfigError::Rejected(vec![format!(
            "Concurrency exceeded: {} endpoints > max_concurrent_streams={}",
            derived.worst_case_concurrency, platform.max_concurrent_streams
        )]));
    }

    info!(
        "✅ Config loaded: {} walls ({} tile, {} bigscreen), {} sources, {} endpoints, concurrency {}/{}, hash={:.16} from={}",
        derived.total_walls,
        derived.tile_walls,
        derived.bigscreen_walls,
        derived.total_sources,
        derived.total_display_endpoints,
        derived.worst_case_concurrency,
        platform.max_concurrent_streams,
        derived.config_hash,
        source_path
    );

    Ok(ConfigSnapshot {
        platform,
        walls: typed.walls,
        sources: typed.sources,
        policy: typed.policy,
        derived,
        canonical_json: canonical,
        raw_yaml: yaml_text.to_string(),
        loaded_from: source_path.to_string(),
        loaded_at: Utc::now(),
    })
}

/// Load a snapshot from a file path.
pub fn load_config_file(path: &Path) -> Result<ConfigSnapshot> {
    let text = std::fs::read_to_string(path)?;
    load_config(&text, &path.display().to_string())
}

/// Dry-run outcome: validation verdict plus predicted metrics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DryRunOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walls: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tiles: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_screens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_endpoints: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sfu_rooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mosaic_pipelines: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_bandwidth_gbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst_case_concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency_headroom: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_hash: Option<String>,
}

/// Validate YAML and report predicted metrics without touching any state.
pub fn dry_run(yaml_text: &str) -> DryRunOutcome {
    match load_config(yaml_text, "<dry-run>") {
        Ok(snapshot) => {
            let d = &snapshot.derived;
            DryRunOutcome {
                valid: true,
                errors: Vec::new(),
                version: Some(snapshot.platform.version.clone()),
                walls: Some(d.total_walls),
                sources: Some(d.total_sources),
                total_tiles: Some(d.total_tiles),
                total_screens: Some(d.total_screens),
                total_endpoints: Some(d.total_display_endpoints),
                sfu_rooms: Some(d.sfu_rooms_needed),
                mosaic_pipelines: Some(d.mosaic_pipelines_needed),
                estimated_bandwidth_gbps: Some(d.estimated_bandwidth_gbps),
                worst_case_concurrency: Some(d.worst_case_concurrency),
                concurrency_headroom: Some(d.concurrency_headroom),
                predicted_hash: Some(d.config_hash.clone()),
            }
        }
        Err(err) => DryRunOutcome {
            valid: false,
            errors: err.error_strings(),
            version: None,
            walls: None,
            sources: None,
            total_tiles: None,
            total_screens: None,
            total_endpoints: None,
            sfu_rooms: None,
            mosaic_pipelines: None,
            estimated_bandwidth_gbps: None,
            worst_case_concurrency: None,
            concurrency_headroom: None,
            predicted_hash: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const VALID_MINIMAL: &str = r#"
platform:
  version: "1.0.0"
  max_concurrent_streams: 64
walls:
  - id: wall-a
    type: tiles
    classification: unclassified
    latency_class: interactive
    grid: { rows: 2, cols: 2 }
sources:
  - id: src-1
    type: webrtc
    tags: { classification: unclassified }
"#;

    const VALID_FULL: &str = r#"
platform:
  version: "2.0.0"
  max_concurrent_streams: 128
  codec_policy:
    tiles: h264
    mosaics: hevc
  latency_classes:
    interactive_max_ms: 400
    broadcast_max_ms: 5000
walls:
  - id: wall-alpha
    type: tiles
    classification: confidential
    grid: { rows: 6, cols: 4 }
    resolution: 1920x1080
    latency_class: interactive
    tags: { mission: alpha }
  - id: wall-beta
    type: bigscreen
    classification: secret
    screens: 2
    resolution: 3840x2160
    latency_class: broadcast
    tags: { mission: beta }
sources:
  - id: vdi-01
    type: webrtc
    codec: h264
    bitrate_kbps: 6000
    tags: { classification: confidential }
  - id: hdmi-01
    type: srt
    endpoint: "srt://10.10.10.1:9000"
    bitrate_kbps: 8000
    tags: { classification: secret }
policy:
  taxonomy:
    classifications: ["unclassified", "confidential", "secret"]
  rules:
    - id: rule-1
      effect: allow
      when: { source_tags_subset_of_operator_tags: true }
    - id: rule-deny
      effect: deny
      when: { always: true }
"#;

    #[test]
    fn test_minimal_valid() {
        let snapshot = load_config(VALID_MINIMAL, "<test>").unwrap();
        assert_eq!(snapshot.derived.total_walls, 1);
        assert_eq!(snapshot.derived.total_tiles, 4);
        assert_eq!(snapshot.derived.total_sources, 1);
    }

    #[test]
    fn test_full_valid() {
        let snapshot = load_config(VALID_FULL, "<test>").unwrap();
        assert_eq!(snapshot.derived.total_walls, 2);
        assert_eq!(snapshot.derived.tile_walls, 1);
        assert_eq!(snapshot.derived.bigscreen_walls, 1);
        assert_eq!(snapshot.derived.total_tiles, 24);
        assert_eq!(snapshot.derived.total_screens, 2);
        assert_eq!(snapshot.derived.total_display_endpoints, 26);
        assert_eq!(snapshot.policy.rules.len(), 2);
        assert_eq!(snapshot.get_wall("wall-alpha").unwrap().grid.unwrap().rows, 6);
        assert_eq!(snapshot.get_source("hdmi-01").unwrap().kind, "srt");
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = load_config("walls: [\n", "<test>").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_scalar_document_rejected() {
        let err = load_config("just a string", "<test>").unwrap_err();
        assert!(err.to_string().contains("YAML mapping"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = r#"
platform: { version: "1.0.0", max_concurrent_streams: 64 }
walls:
  - { id: wall-a, type: bigscreen, classification: c, latency_class: broadcast, screens: 1 }
  - { id: wall-a, type: bigscreen, classification: c, latency_class: broadcast, screens: 1 }
"#;
        let err = load_config(yaml, "<test>").unwrap_err();
        assert!(err.to_string().contains("Duplicate wall id"));
    }

    #[test]
    fn test_concurrency_guardrail() {
        let yaml = r#"
platform: { version: "1.0.0", max_concurrent_streams: 4 }
walls:
  - id: wall-a
    type: tiles
    classification: unclassified
    latency_class: interactive
    grid: { rows: 3, cols: 3 }
"#;
        let err = load_config(yaml, "<test>").unwrap_err();
        assert!(err.to_string().contains("Concurrency exceeded"));
    }

    #[test]
    fn test_canonical_json_is_fixed_point() {
        let snapshot = load_config(VALID_FULL, "<test>").unwrap();
        let reparsed: serde_json::Value =
            serde_json::from_str(&snapshot.canonical_json).unwrap();
        assert_eq!(
            snapshot.canonical_json,
            wallgrid_common::canonical_json(&reparsed)
        );
        // same yaml, same hash
        let again = load_config(VALID_FULL, "<elsewhere>").unwrap();
        assert_eq!(snapshot.derived.config_hash, again.derived.config_hash);
    }

    #[test]
    fn test_dry_run_valid_reports_metrics() {
        let out = dry_run(VALID_FULL);
        assert!(out.valid);
        assert!(out.errors.is_empty());
        assert_eq!(out.total_endpoints, Some(26));
        assert!(out.predicted_hash.is_some());
    }

    #[test]
    fn test_dry_run_invalid_reports_errors() {
        let out = dry_run("walls:\n  - id: w\n    type: tiles\n");
        assert!(!out.valid);
        assert!(!out.errors.is_empty());
        assert!(out.predicted_hash.is_none());
    }
}
