//! Operational endpoints: health, gateway probe proxy, manual reconcile

use axum::extract::State;
use axum::Json;
use serde_json::json;
use std::time::Duration;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::reconcile::reconcile_once;
use crate::state::AppState;

pub async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": db_ok,
    }))
}

/// Proxy a source probe to the gateway for onboarding validation.
pub async fn gateway_probe(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<serde_json::Value>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(&["operator"])?;

    let url = format!("{}/probe", state.settings.gateway_url);
    let response = state
        .http
        .post(&url)
        .timeout(Duration::from_secs(15))
        .json(&payload)
        .send()
        .await
        .map_err(|_| ApiError::Upstream("gateway_probe_error".into()))?;
    if !response.status().is_success() {
        return Err(ApiError::Upstream("gateway_probe_error".into()));
    }
    let body = response
        .json()
        .await
        .map_err(|_| ApiError::Upstream("gateway_probe_error".into()))?;
    Ok(Json(body))
}

/// Manually trigger one reconciliation pass.
pub async fn config_reconcile(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_admin()?;

    let summary = reconcile_once(&state.pool, &state.http, &state.settings).await?;
    let mut body = json!({"reconciled": true});
    if let (Some(target), Some(source)) = (body.as_object_mut(), summary.as_object()) {
        for (k, v) in source {
            target.insert(k.clone(), v.clone());
        }
    }
    Ok(Json(body))
}
