//! Router assembly for the Management Service API

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::ops::healthz))
        .route("/api/v1/auth/whoami", get(handlers::auth::whoami))
        // Walls
        .route(
            "/api/v1/walls",
            get(handlers::walls::list_walls).post(handlers::walls::create_wall),
        )
        .route(
            "/api/v1/walls/:wall_id",
            get(handlers::walls::get_wall)
                .put(handlers::walls::update_wall)
                .delete(handlers::walls::delete_wall),
        )
        // Sources
        .route(
            "/api/v1/sources",
            get(handlers::sources::list_sources).post(handlers::sources::create_source),
        )
        .route(
            "/api/v1/sources/:source_id",
            get(handlers::sources::get_source)
                .put(handlers::sources::update_source)
                .delete(handlers::sources::delete_source),
        )
        // Layouts
        .route(
            "/api/v1/layouts",
            get(handlers::layouts::list_layouts).post(handlers::layouts::create_layout),
        )
        .route(
            "/api/v1/layouts/:layout_id",
            get(handlers::layouts::get_layout)
                .put(handlers::layouts::update_layout)
                .delete(handlers::layouts::delete_layout),
        )
        .route("/api/v1/layouts/:layout_id/activate", put(handlers::layouts::activate))
        // Policy + tokens
        .route("/api/v1/policy/evaluate", post(handlers::policy::evaluate))
        .route("/api/v1/tokens/subscribe", post(handlers::tokens::subscribe))
        // Bundles
        .route("/api/v1/bundles/export", post(handlers::bundles::export))
        .route("/api/v1/bundles/import", post(handlers::bundles::import))
        // Audit
        .route("/api/v1/audit/query", get(handlers::audit::query))
        .route("/api/v1/audit/verify", get(handlers::audit::verify))
        .route("/api/v1/audit/export", get(handlers::audit::export))
        // Ops
        .route("/api/v1/gateway/probe", post(handlers::ops::gateway_probe))
        .route("/api/v1/config/reconcile", post(handlers::ops::config_reconcile))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
