//! Derived metrics
//!
//! Deterministic totals and capacity estimates computed from a validated
//! document. The bandwidth model is fixed: 6 Mbps per tile, 15 Mbps per
//! bigscreen screen, plus declared source bitrates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use wallgrid_common::sha256_hex;

use crate::model::{PlatformSettings, SourceSpec, WallSpec};

const TILE_MBPS: f64 = 6.0;
const SCREEN_MBPS: f64 = 15.0;

/// Metrics derived from one configuration snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub total_walls: u32,
    pub tile_walls: u32,
    pub bigscreen_walls: u32,
    pub total_tiles: u32,
    pub total_screens: u32,
    pub total_display_endpoints: u32,
    pub total_sources: u32,
    pub sources_by_type: BTreeMap<String, u32>,
    pub sfu_rooms_needed: u32,
    pub mosaic_pipelines_needed: u32,
    pub estimated_bandwidth_gbps: f64,
    pub worst_case_concurrency: u32,
    pub concurrency_headroom: i64,
    pub config_hash: String,
}

impl DerivedMetrics {
    /// Compute all metrics. Pure: same inputs, same outputs.
    pub fn compute(
        platform: &PlatformSettings,
        walls: &[WallSpec],
        sources: &[SourceSpec],
        canonical_json: &str,
    ) -> Self {
        let mut m = DerivedMetrics {
            total_walls: walls.len() as u32,
            total_sources: sources.len() as u32,
            ..Default::default()
        };

        for wall in walls {
            match wall.kind.as_str() {
                "tiles" => {
                    m.tile_walls += 1;
                    m.total_tiles += wall.tile_count();
                }
                "bigscreen" => {
                    m.bigscreen_walls += 1;
                    m.total_screens += wall.screens;
                }
                _ => {}
            }
        }
        m.total_display_endpoints = m.total_tiles + m.total_screens;

        for source in sources {
            *m.sources_by_type.entry(source.kind.clone()).or_insert(0) += 1;
        }
        m.sfu_rooms_needed = m.tile_walls;
        m.mosaic_pipelines_needed = m.bigscreen_walls;

        let tile_bw = f64::from(m.total_tiles) * TILE_MBPS;
        let screen_bw = f64::from(m.total_screens) * SCREEN_MBPS;
        let source_bw: f64 = sources
            .iter()
            .filter(|s| s.bitrate_kbps > 0)
            .map(|s| f64::from(s.bitrate_kbps) / 1000.0)
            .sum();
        m.estimated_bandwidth_gbps =
            ((tile_bw + screen_bw + source_bw) / 1000.0 * 1000.0).round() / 1000.0;

        // worst case: every display endpoint pulling a stream at once
        m.worst_case_concurrency = m.total_display_endpoints;
        m.concurrency_headroom =
            i64::from(platform.max_concurrent_streams) - i64::from(m.worst_case_concurrency);
        m.config_hash = sha256_hex(canonical_json.as_bytes());
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn tiled(id: &str, rows: u32, cols: u32) -> WallSpec {
        serde_yaml::from_str(&format!(
            "id: {id}\ntype: tiles\nclassification: unclassified\nlatency_class: interactive\ngrid: {{ rows: {rows}, cols: {cols} }}\n"
        ))
        .unwrap()
    }

    fn bigscreen(id: &str, screens: u32) -> WallSpec {
        serde_yaml::from_str(&format!(
            "id: {id}\ntype: bigscreen\nclassification: secret\nlatency_class: broadcast\nscreens: {screens}\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_endpoint_totals() {
        let platform = PlatformSettings::default();
        let walls = vec![tiled("wall-alpha", 6, 4), bigscreen("wall-beta", 2)];
        let m = DerivedMetrics::compute(&platform, &walls, &[], "{}");
        assert_eq!(m.total_walls, 2);
        assert_eq!(m.tile_walls, 1);
        assert_eq!(m.bigscreen_walls, 1);
        assert_eq!(m.total_tiles, 24);
        assert_eq!(m.total_screens, 2);
        assert_eq!(m.total_display_endpoints, 26);
        assert_eq!(m.sfu_rooms_needed, 1);
        assert_eq!(m.mosaic_pipelines_needed, 1);
        assert_eq!(m.worst_case_concurrency, 26);
        assert_eq!(m.concurrency_headroom, 64 - 26);
    }

    #[test]
    fn test_bandwidth_model() {
        let platform = PlatformSettings::default();
        let walls = vec![tiled("w", 2, 2), bigscreen("b", 1)];
        let sources: Vec<SourceSpec> = vec![
            serde_yaml::from_str("id: s1\ntype: webrtc\nbitrate_kbps: 6000\n").unwrap(),
            serde_yaml::from_str("id: s2\ntype: srt\nendpoint: srt://x\nbitrate_kbps: 0\n").unwrap(),
        ];
        let m = DerivedMetrics::compute(&platform, &walls, &sources, "{}");
        // 4 tiles * 6 + 1 screen * 15 + 6000/1000 = 45 Mbps -> 0.045 Gbps
        assert_eq!(m.estimated_bandwidth_gbps, 0.045);
        assert_eq!(m.sources_by_type.get("webrtc"), Some(&1));
        assert_eq!(m.sources_by_type.get("srt"), Some(&1));
    }

    #[test]
    fn test_hash_tracks_canonical_bytes() {
        let platform = PlatformSettings::default();
        let a = DerivedMetrics::compute(&platform, &[], &[], "{}");
        let b = DerivedMetrics::compute(&platform, &[], &[], "{}");
        let c = DerivedMetrics::compute(&platform, &[], &[], "{\"x\":1}");
        assert_eq!(a.config_hash, b.config_hash);
        assert_ne!(a.config_hash, c.config_hash);
    }
}
