//! Policy proxy
//!
//! Builds the evaluation request from the caller's verified claims (never
//! from the payload), proxies to the Policy Engine, and audits the
//! decision. An unreachable engine is a 502 — fail closed.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use wallgrid_audit::{append_event, NewEvent};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::{PolicyEvalRequest, PolicyEvalResponse};
use crate::policy_client;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EvaluateBody {
    pub wall_id: i64,
    pub source_id: i64,
}

pub async fn evaluate(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<EvaluateBody>,
) -> ApiResult<Json<PolicyEvalResponse>> {
    user.require_role(&["viewer", "operator"])?;

    let operator_id = user.operator_id();
    let req = PolicyEvalRequest {
        wall_id: body.wall_id,
        source_id: body.source_id,
        operator_id: operator_id.clone(),
        operator_roles: user.roles.clone(),
        operator_tags: user.operator_tags(),
    };
    let result = policy_client::evaluate(&state.http, &state.settings.policy_url, &req).await?;

    append_event(
        &state.pool,
        state.chain_id(),
        NewEvent::new(
            "policy.evaluate",
            operator_id,
            "policy",
            format!("{}:{}", req.wall_id, req.source_id),
            json!({"allowed": result.allowed, "reason": result.reason}),
        ),
    )
    .await?;

    Ok(Json(result))
}
