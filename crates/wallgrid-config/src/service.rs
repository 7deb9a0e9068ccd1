//! Configuration Authority HTTP surface
//!
//! Read endpoints serve the current snapshot; `X-Config-Hash` carries the
//! content hash on the config bodies so peers can cheaply detect change.
//! Dry-run validates a candidate document without touching state; reload
//! forces a re-read of the file even if its bytes have not changed.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::loader::dry_run;
use crate::model::{SourceSpec, WallSpec};
use crate::watcher::ConfigWatcher;

/// Response header carrying the canonical-JSON content hash.
pub static CONFIG_HASH_HEADER: HeaderName = HeaderName::from_static("x-config-hash");

/// Shared state of the authority service
#[derive(Clone)]
pub struct AuthorityState {
    pub watcher: Arc<ConfigWatcher>,
}

fn no_config() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"detail": "Configuration not loaded"})),
    )
        .into_response()
}

fn not_found(detail: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"detail": detail}))).into_response()
}

/// Wall rendering for the entity endpoints: spec fields plus the derived
/// tile count consumers key on.
fn wall_json(wall: &WallSpec) -> serde_json::Value {
    let mut value = serde_json::to_value(wall).unwrap_or_default();
    value["tile_count"] = json!(wall.tile_count());
    value
}

fn source_json(source: &SourceSpec) -> serde_json::Value {
    serde_json::to_value(source).unwrap_or_default()
}

async fn healthz(State(state): State<AuthorityState>) -> Response {
    let health = state.watcher.health().await;
    if health.status == "ok" {
        Json(health).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(health)).into_response()
    }
}

async fn get_config(State(state): State<AuthorityState>) -> Response {
    match state.watcher.current().await {
        Some(snapshot) => (
            [
                (CONFIG_HASH_HEADER.clone(), snapshot.derived.config_hash.clone()),
                (
                    HeaderName::from_static("content-type"),
                    "application/json".to_string(),
                ),
            ],
            snapshot.canonical_json.clone(),
        )
            .into_response(),
        None => no_config(),
    }
}

async fn get_config_raw(State(state): State<AuthorityState>) -> Response {
    match state.watcher.current().await {
        Some(snapshot) => (
            [
                (CONFIG_HASH_HEADER.clone(), snapshot.derived.config_hash.clone()),
                (
                    HeaderName::from_static("content-type"),
                    "application/yaml".to_string(),
                ),
            ],
            snapshot.raw_yaml.clone(),
        )
            .into_response(),
        None => no_config(),
    }
}

async fn get_version(State(state): State<AuthorityState>) -> Response {
    match state.watcher.current().await {
        Some(snapshot) => Json(json!({
            "version": snapshot.platform.version,
            "config_hash": snapshot.derived.config_hash,
            "loaded_from": snapshot.loaded_from,
            "loaded_at": snapshot.loaded_at,
        }))
        .into_response(),
        None => no_config(),
    }
}

async fn get_derived(State(state): State<AuthorityState>) -> Response {
    match state.watcher.current().await {
        Some(snapshot) => Json(snapshot.derived.clone()).into_response(),
        None => no_config(),
    }
}

async fn list_walls(State(state): State<AuthorityState>) -> Response {
    match state.watcher.current().await {
        Some(snapshot) => {
            let walls: Vec<_> = snapshot.walls.iter().map(wall_json).collect();
            Json(json!({"walls": walls})).into_response()
        }
        None => no_config(),
    }
}

async fn get_wall(
    State(state): State<AuthorityState>,
    Path(wall_id): Path<String>,
) -> Response {
    match state.watcher.current().await {
        Some(snapshot) => match snapshot.get_wall(&wall_id) {
            Some(wall) => Json(wall_json(wall)).into_response(),
            None => not_found(format!("Wall not found: {wall_id}")),
        },
        None => no_config(),
    }
}

async fn list_sources(State(state): State<AuthorityState>) -> Response {
    match state.watcher.current().await {
        Some(snapshot) => {
            let sources: Vec<_> = snapshot.sources.iter().map(source_json).collect();
            Json(json!({"sources": sources})).into_response()
        }
        None => no_config(),
    }
}

async fn get_source(
    State(state): State<AuthorityState>,
    Path(source_id): Path<String>,
) -> Response {
    match state.watcher.current().await {
        Some(snapshot) => match snapshot.get_source(&source_id) {
            Some(source) => Json(source_json(source)).into_response(),
            None => not_found(format!("Source not found: {source_id}")),
        },
        None => no_config(),
    }
}

async fn get_policy(State(state): State<AuthorityState>) -> Response {
    match state.watcher.current().await {
        Some(snapshot) => Json(snapshot.policy.clone()).into_response(),
        None => no_config(),
    }
}

async fn config_dry_run(body: Bytes) -> Response {
    let text = String::from_utf8_lossy(&body);
    let outcome = dry_run(&text);
    let status = if outcome.valid {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(outcome)).into_response()
}

async fn config_reload(State(state): State<AuthorityState>) -> Response {
    match state.watcher.force_reload().await {
        Some(snapshot) => Json(json!({
            "reloaded": true,
            "version": snapshot.platform.version,
            "hash": snapshot.derived.config_hash,
        }))
        .into_response(),
        None => Json(json!({
            "reloaded": false,
            "reason": "No changes detected or reload failed",
        }))
        .into_response(),
    }
}

/// Build the Configuration Authority router.
pub fn router(state: AuthorityState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/config/raw", get(get_config_raw))
        .route("/api/v1/config/version", get(get_version))
        .route("/api/v1/derived", get(get_derived))
        .route("/api/v1/walls", get(list_walls))
        .route("/api/v1/walls/:wall_id", get(get_wall))
        .route("/api/v1/sources", get(list_sources))
        .route("/api/v1/sources/:source_id", get(get_source))
        .route("/api/v1/policy", get(get_policy))
        .route("/api/v1/config/dry-run", post(config_dry_run))
        .route("/api/v1/config/reload", post(config_reload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
