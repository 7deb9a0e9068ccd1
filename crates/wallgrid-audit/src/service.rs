//! Standalone audit service
//!
//! HTTP surface for deployments that extract the audit chain into its own
//! process: `POST /ingest`, `GET /query`, `GET /verify`, `GET /export`.
//! All endpoints default to the service's configured chain id; `chain_id`
//! may be passed to address another chain in a shared database.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing::{error, instrument};
use wallgrid_common::sha256_hex;

use crate::chain::{append_event, NewEvent};
use crate::error::AuditError;
use crate::store::{fetch_last_n, query_events, EventFilter};
use crate::verify::verify_events;

/// Shared state of the audit service
#[derive(Debug, Clone)]
pub struct AuditState {
    pub pool: PgPool,
    pub chain_id: String,
}

impl IntoResponse for AuditError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuditError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("❌ Audit service error: {}", self);
        }
        (status, Json(json!({"detail": self.to_string()}))).into_response()
    }
}

fn parse_ts(label: &str, raw: &str) -> Result<DateTime<Utc>, AuditError> {
    DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AuditError::InvalidInput(format!("invalid_{label}:{e}")))
}

async fn ingest(
    State(state): State<AuditState>,
    Json(ev): Json<NewEvent>,
) -> Result<impl IntoResponse, AuditError> {
    let event = append_event(&state.pool, &state.chain_id, ev).await?;
    Ok(Json(event))
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    action: Option<String>,
    actor: Option<String>,
    since: Option<String>,
    until: Option<String>,
    #[serde(default = "default_query_limit")]
    limit: i64,
    chain_id: Option<String>,
}

fn default_query_limit() -> i64 {
    200
}

async fn query(
    State(state): State<AuditState>,
    Query(params): Query<QueryParams>,
) -> Result<impl IntoResponse, AuditError> {
    let chain = params.chain_id.as_deref().unwrap_or(&state.chain_id);
    let filter = EventFilter {
        action: params.action,
        actor: params.actor,
        since: params.since.as_deref().map(|s| parse_ts("since", s)).transpose()?,
        until: params.until.as_deref().map(|s| parse_ts("until", s)).transpose()?,
        limit: params.limit,
    };
    let events = query_events(&state.pool, chain, &filter).await?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(default = "default_verify_n")]
    last_n: i64,
    chain_id: Option<String>,
}

fn default_verify_n() -> i64 {
    1000
}

#[instrument(level = "debug", skip(state))]
async fn verify(
    State(state): State<AuditState>,
    Query(params): Query<VerifyParams>,
) -> Result<impl IntoResponse, AuditError> {
    let chain = params.chain_id.as_deref().unwrap_or(&state.chain_id);
    let n = params.last_n.clamp(1, 200_000);
    let events = fetch_last_n(&state.pool, chain, n).await?;
    Ok(Json(verify_events(chain, &events)))
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    since: Option<String>,
    until: Option<String>,
    chain_id: Option<String>,
}

/// Export response: events rendered one-per-line as compact JSON, plus a
/// digest of the rendered body so the consumer can prove what it received.
#[derive(Debug, Serialize)]
struct ExportOut {
    chain_id: String,
    count: usize,
    jsonl: String,
    sha256: String,
}

async fn export(
    State(state): State<AuditState>,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, AuditError> {
    let chain = params.chain_id.as_deref().unwrap_or(&state.chain_id);
    let filter = EventFilter {
        action: None,
        actor: None,
        since: params.since.as_deref().map(|s| parse_ts("since", s)).transpose()?,
        until: params.until.as_deref().map(|s| parse_ts("until", s)).transpose()?,
        limit: 1000,
    };
    let mut events = query_events(&state.pool, chain, &filter).await?;
    events.reverse();

    let mut jsonl = String::new();
    for ev in &events {
        jsonl.push_str(&serde_json::to_string(ev)?);
        jsonl.push('\n');
    }
    Ok(Json(ExportOut {
        chain_id: chain.to_string(),
        count: events.len(),
        sha256: sha256_hex(jsonl.as_bytes()),
        jsonl,
    }))
}

async fn healthz(State(_state): State<AuditState>) -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Build the audit service router.
pub fn router(state: AuditState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ingest", post(ingest))
        .route("/query", get(query))
        .route("/verify", get(verify))
        .route("/export", get(export))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_parse_ts_accepts_zulu_and_offset() {
        assert!(parse_ts("since", "2026-03-01T08:00:00Z").is_ok());
        assert!(parse_ts("since", "2026-03-01T08:00:00+00:00").is_ok());
        let err = parse_ts("since", "yesterday").unwrap_err();
        assert!(err.to_string().contains("invalid_since"));
    }
}
