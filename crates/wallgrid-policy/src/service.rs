//! Policy Engine HTTP surface
//!
//! `POST /evaluate` enriches the request with wall/source tags and runs
//! the evaluator; `POST /reload` re-walks the policy source chain;
//! `GET /policy` exposes the live document.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::engine::PolicyEngine;
use crate::enrich::TagLookup;
use crate::loader::resolve_policy;
use crate::model::EvalRequest;

/// Shared state of the policy service
#[derive(Clone)]
pub struct PolicyState {
    pub engine: Arc<PolicyEngine>,
    pub lookup: Arc<dyn TagLookup>,
    pub client: reqwest::Client,
    pub config_url: Option<String>,
    pub policy_path: Option<PathBuf>,
}

#[instrument(level = "debug", skip(state, req))]
async fn evaluate(
    State(state): State<PolicyState>,
    Json(req): Json<EvalRequest>,
) -> Response {
    let (wall_tags, source_tags) = tokio::join!(
        state.lookup.wall_tags(req.wall_id),
        state.lookup.source_tags(req.source_id),
    );
    let decision = state.engine.evaluate(&req, &source_tags, &wall_tags).await;
    Json(decision).into_response()
}

async fn reload(State(state): State<PolicyState>) -> Response {
    let resolved = resolve_policy(
        &state.client,
        state.config_url.as_deref(),
        state.policy_path.as_deref(),
    )
    .await;

    if resolved.source == "default" {
        if let Some(err) = resolved.last_error {
            let kind = match err {
                crate::error::PolicyError::InvalidDocument(_) => "InvalidDocument",
                crate::error::PolicyError::Upstream(_) => "Upstream",
                crate::error::PolicyError::Io(_) => "Io",
            };
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": format!("reload_failed:{kind}")})),
            )
                .into_response();
        }
    }

    state.engine.replace(resolved.doc, resolved.source.clone()).await;
    Json(json!({"reloaded": true, "source": resolved.source})).into_response()
}

async fn get_policy(State(state): State<PolicyState>) -> Response {
    let doc = state.engine.document().await;
    Json(doc.as_ref().clone()).into_response()
}

async fn healthz(State(state): State<PolicyState>) -> Response {
    let doc = state.engine.document().await;
    Json(json!({
        "status": "ok",
        "source": state.engine.source().await,
        "rules": doc.rules.len(),
    }))
    .into_response()
}

/// Build the Policy Engine router.
pub fn router(state: PolicyState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/evaluate", post(evaluate))
        .route("/reload", post(reload))
        .route("/policy", get(get_policy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::StaticTagLookup;
    use crate::model::{PolicyDoc, PolicyRule};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state_with(doc: PolicyDoc, lookup: StaticTagLookup) -> PolicyState {
        PolicyState {
            engine: Arc::new(PolicyEngine::new(doc, "file")),
            lookup: Arc::new(lookup),
            client: reqwest::Client::new(),
            config_url: None,
            policy_path: None,
        }
    }

    fn subset_rule() -> PolicyDoc {
        PolicyDoc {
            rules: vec![PolicyRule {
                id: "rule-1".to_string(),
                effect: "allow".to_string(),
                description: String::new(),
                when: [(
                    "source_tags_subset_of_operator_tags".to_string(),
                    serde_json::Value::Bool(true),
                )]
                .into_iter()
                .collect(),
            }],
            ..Default::default()
        }
    }

    async fn post_eval(app: Router, body: serde_json::Value) -> serde_json::Value {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/evaluate")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_evaluate_enriches_and_allows() {
        let mut lookup = StaticTagLookup::default();
        lookup.sources.insert(2, vec!["C".to_string(), "ops".to_string()]);
        let app = router(state_with(subset_rule(), lookup));

        let decision = post_eval(
            app,
            serde_json::json!({
                "wall_id": 1, "source_id": 2, "operator_id": "op-1",
                "operator_roles": ["operator"],
                "operator_tags": ["C", "ops", "briefing"]
            }),
        )
        .await;
        assert_eq!(decision["allowed"], true);
        assert_eq!(decision["reason"], "allowed_by:rule-1");
    }

    #[tokio::test]
    async fn test_evaluate_missing_tags_denies() {
        // lookup knows nothing: enrichment yields empty sets; empty source
        // tags are a subset of anything, so use a wall-intersect rule
        let doc = PolicyDoc {
            rules: vec![PolicyRule {
                id: "geo".to_string(),
                effect: "allow".to_string(),
                description: String::new(),
                when: [(
                    "source_tags_intersect_wall_tags".to_string(),
                    serde_json::Value::Bool(true),
                )]
                .into_iter()
                .collect(),
            }],
            ..Default::default()
        };
        let app = router(state_with(doc, StaticTagLookup::default()));
        let decision = post_eval(
            app,
            serde_json::json!({
                "wall_id": 1, "source_id": 2, "operator_id": "op-1"
            }),
        )
        .await;
        assert_eq!(decision["allowed"], false);
        assert_eq!(decision["reason"], "default_deny");
    }

    #[tokio::test]
    async fn test_get_policy_returns_document() {
        let app = router(state_with(subset_rule(), StaticTagLookup::default()));
        let response = app
            .oneshot(Request::builder().uri("/policy").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["rules"][0]["id"], "rule-1");
    }

    #[tokio::test]
    async fn test_reload_with_no_sources_serves_default_deny() {
        // no config_url, no policy_path: chain resolves to the default
        // document with no recorded error, so reload succeeds
        let app = router(state_with(subset_rule(), StaticTagLookup::default()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
