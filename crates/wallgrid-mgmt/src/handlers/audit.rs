//! Audit query and verification
//!
//! Queries run against the local chain; verification and export proxy to
//! the audit service so the walk happens next to the data it certifies.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use wallgrid_audit::store::{query_events, EventFilter};
use wallgrid_audit::AuditEvent;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub action: Option<String>,
    pub actor: Option<String>,
    pub since: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    200
}

fn parse_since(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ApiError::BadRequest(format!("invalid_since:{e}")))
}

pub async fn query(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<Json<Vec<AuditEvent>>> {
    user.require_admin()?;

    let filter = EventFilter {
        action: params.action,
        actor: params.actor,
        since: params.since.as_deref().map(parse_since).transpose()?,
        until: None,
        limit: params.limit.clamp(1, 1000),
    };
    let events = query_events(&state.pool, state.chain_id(), &filter)
        .await
        .map_err(|e| ApiError::Internal(format!("audit_error:{e}")))?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(default = "default_verify_n")]
    pub last_n: i64,
}

fn default_verify_n() -> i64 {
    1000
}

pub async fn verify(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<VerifyParams>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_admin()?;

    let url = format!("{}/verify", state.settings.audit_url);
    let response = state
        .http
        .get(&url)
        .timeout(Duration::from_secs(30))
        .query(&[("last_n", params.last_n)])
        .send()
        .await
        .map_err(|_| ApiError::Upstream("audit_service_error".into()))?;
    if !response.status().is_success() {
        return Err(ApiError::Upstream("audit_service_error".into()));
    }
    let body = response
        .json()
        .await
        .map_err(|_| ApiError::Upstream("audit_service_error".into()))?;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub since: Option<String>,
    pub until: Option<String>,
}

pub async fn export(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ExportParams>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_admin()?;

    let url = format!("{}/export", state.settings.audit_url);
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(since) = params.since {
        query.push(("since", since));
    }
    if let Some(until) = params.until {
        query.push(("until", until));
    }

    let response = state
        .http
        .get(&url)
        .timeout(Duration::from_secs(30))
        .query(&query)
        .send()
        .await
        .map_err(|_| ApiError::Upstream("audit_service_error".into()))?;
    if !response.status().is_success() {
        return Err(ApiError::Upstream("audit_service_error".into()));
    }
    let body = response
        .json()
        .await
        .map_err(|_| ApiError::Upstream("audit_service_error".into()))?;
    Ok(Json(body))
}
