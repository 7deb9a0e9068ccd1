//! Wallgrid Management Service
//!
//! Authoritative CRUD for walls, sources, and versioned layouts; bearer
//! token authentication with role-based authorization; stream token
//! minting gated by the Policy Engine; bundle export/import; audit query
//! and verification; and the reconciliation loop that converges relational
//! state toward the Configuration Authority's declarative snapshot.

pub mod auth;
pub mod bundles;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod policy_client;
pub mod reconcile;
pub mod routes;
pub mod settings;
pub mod state;
pub mod tokens;

pub use error::{ApiError, ApiResult};
pub use settings::MgmtSettings;
pub use state::AppState;
