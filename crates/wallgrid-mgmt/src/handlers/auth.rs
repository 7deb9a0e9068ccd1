//! Identity echo

use axum::Json;

use crate::auth::AuthUser;
use crate::models::WhoAmI;

/// `GET /api/v1/auth/whoami` — any authenticated caller.
pub async fn whoami(user: AuthUser) -> Json<WhoAmI> {
    Json(WhoAmI {
        sub: user.operator_id(),
        preferred_username: user
            .claims
            .get("preferred_username")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string(),
        roles: user.roles.clone(),
        claims: user.claims.clone(),
    })
}
