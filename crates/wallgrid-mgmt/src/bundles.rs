//! Bundle export and import
//!
//! Export snapshots walls, sources, and the currently-active layouts.
//! Import verifies an optional HMAC-SHA256 over the canonical JSON of the
//! payload (constant-time comparison) and stages the bundle; applying a
//! staged bundle is a separate operator step.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;

use wallgrid_common::canonical_json;

use crate::error::{ApiError, ApiResult};
use crate::models::{BundleExport, Layout, Source, Wall};

type HmacSha256 = Hmac<Sha256>;

/// Snapshot the database into a bundle.
pub async fn export_bundle(pool: &PgPool) -> ApiResult<BundleExport> {
    let walls = sqlx::query_as::<_, Wall>(
        "SELECT id, name, wall_type, tile_count, resolution, tags FROM walls ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let sources = sqlx::query_as::<_, Source>(
        "SELECT id, name, source_type, protocol, endpoint_url, codec, tags, health_status \
         FROM sources ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let active_layouts = sqlx::query_as::<_, Layout>(
        "SELECT id, wall_id, name, version, grid_config, preset_name, is_active, created_by, created_at \
         FROM layouts WHERE is_active=TRUE ORDER BY wall_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(BundleExport {
        walls,
        sources,
        active_layouts,
    })
}

/// HMAC-SHA256 hex over the canonical JSON of a payload.
pub fn payload_hmac_hex(secret: &str, payload: &serde_json::Value) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(canonical_json(payload).as_bytes());
    let digest = mac.finalize().into_bytes();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Verify a bundle payload against a caller-supplied hex MAC.
///
/// Returns `missing_hmac` when no MAC accompanies the payload and
/// `invalid_hmac` on any mismatch. Comparison happens inside the HMAC
/// primitive, in constant time.
pub fn verify_payload_hmac(
    secret: &str,
    payload: &serde_json::Value,
    provided_hex: Option<&str>,
) -> ApiResult<()> {
    let provided = provided_hex.ok_or_else(|| ApiError::BadRequest("missing_hmac".into()))?;
    let provided_bytes = hex_decode(provided.to_lowercase().as_str())
        .ok_or_else(|| ApiError::BadRequest("invalid_hmac".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(canonical_json(payload).as_bytes());
    mac.verify_slice(&provided_bytes)
        .map_err(|_| ApiError::BadRequest("invalid_hmac".into()))
}
