//! Bundle export and staged import

use axum::extract::State;
use axum::Json;
use serde_json::json;

use wallgrid_audit::{append_event, NewEvent};

use crate::auth::AuthUser;
use crate::bundles::{export_bundle, verify_payload_hmac};
use crate::error::ApiResult;
use crate::models::{BundleExport, BundleImportRequest};
use crate::state::AppState;

pub async fn export(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<BundleExport>> {
    user.require_admin()?;
    let bundle = export_bundle(&state.pool).await?;
    Ok(Json(bundle))
}

pub async fn import(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<BundleImportRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_admin()?;
    req.validate()?;

    let secret = state.settings.bundle_hmac_secret.trim();
    if !secret.is_empty() {
        verify_payload_hmac(secret, &req.payload, req.hmac_hex.as_deref())?;
    }

    // staged only; applying a bundle is a separate operator step
    append_event(
        &state.pool,
        state.chain_id(),
        NewEvent::new(
            "bundles.import.stage",
            user.actor(),
            "bundle",
            req.ring.clone(),
            json!({"ring": req.ring, "payload": req.payload}),
        ),
    )
    .await?;

    Ok(Json(json!({"staged": true, "ring": req.ring})))
}
