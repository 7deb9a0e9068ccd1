//! Stream token subscription
//!
//! Policy first, then mint. Denials are audited with the reason and
//! return `token: null`; only allowed subscriptions mint a credential.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use wallgrid_audit::{append_event, NewEvent};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::{PolicyEvalRequest, TokenSubscribeRequest, TokenSubscribeResponse};
use crate::policy_client;
use crate::state::AppState;
use crate::tokens::mint_stream_token;

pub async fn subscribe(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<TokenSubscribeRequest>,
) -> ApiResult<Json<TokenSubscribeResponse>> {
    user.require_role(&["viewer", "operator"])?;

    let operator_id = user.operator_id();
    let eval_req = PolicyEvalRequest {
        wall_id: payload.wall_id,
        source_id: payload.source_id,
        operator_id: operator_id.clone(),
        operator_roles: user.roles.clone(),
        operator_tags: user.operator_tags(),
    };
    let decision =
        policy_client::evaluate(&state.http, &state.settings.policy_url, &eval_req).await?;

    let object_id = format!("{}:{}:{}", payload.wall_id, payload.source_id, payload.tile_id);

    if !decision.allowed {
        append_event(
            &state.pool,
            state.chain_id(),
            NewEvent::new(
                "tokens.subscribe.deny",
                operator_id,
                "token",
                object_id,
                json!({
                    "reason": decision.reason,
                    "wall_id": payload.wall_id,
                    "source_id": payload.source_id,
                }),
            ),
        )
        .await?;
        return Ok(Json(TokenSubscribeResponse {
            allowed: false,
            reason: decision.reason,
            token: None,
        }));
    }

    let token = mint_stream_token(
        &state.settings.stream_token_secret,
        &operator_id,
        payload.wall_id,
        payload.source_id,
        &payload.tile_id,
        state.settings.stream_token_ttl_seconds,
    )?;

    append_event(
        &state.pool,
        state.chain_id(),
        NewEvent::new(
            "tokens.subscribe.allow",
            operator_id,
            "token",
            object_id,
            json!({
                "wall_id": payload.wall_id,
                "source_id": payload.source_id,
                "tile_id": payload.tile_id,
            }),
        ),
    )
    .await?;

    Ok(Json(TokenSubscribeResponse {
        allowed: true,
        reason: "allowed".to_string(),
        token: Some(token),
    }))
}
