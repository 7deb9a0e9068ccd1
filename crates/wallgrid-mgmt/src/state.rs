//! Shared application state

use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::settings::MgmtSettings;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<MgmtSettings>,
    pub http: reqwest::Client,
    pub verifier: Arc<JwtVerifier>,
}

impl AppState {
    pub fn chain_id(&self) -> &str {
        &self.settings.audit_chain_id
    }
}
