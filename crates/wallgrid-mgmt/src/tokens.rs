//! Stream token minting
//!
//! Short-lived HS256 credentials handed to the media plane after an
//! allowed policy decision. The symmetric secret is distinct from any
//! OIDC material; the media plane validates tokens independently with
//! the same secret.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Token type marker carried in the `typ` claim.
pub const STREAM_TOKEN_TYP: &str = "wallgrid-stream";

/// Claims of a stream access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamClaims {
    pub sub: String,
    pub wall_id: i64,
    pub source_id: i64,
    pub tile_id: String,
    pub iat: i64,
    pub exp: i64,
    pub typ: String,
}

/// Mint a signed stream token with `exp = now + ttl`.
pub fn mint_stream_token(
    secret: &str,
    sub: &str,
    wall_id: i64,
    source_id: i64,
    tile_id: &str,
    ttl_seconds: u64,
) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = StreamClaims {
        sub: sub.to_string(),
        wall_id,
        source_id,
        tile_id: tile_id.to_string(),
        iat: now,
        exp: now + ttl_seconds as i64,
        typ: STREAM_TOKEN_TYP.to_string(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token_mint_error:{e}")))
}

/// Validate a stream token's signature, expiry, and type marker.
///
/// The management service never calls this on its own mint path; it
/// exists for the media plane and for tests.
pub fn validate_stream_token(secret: &str, token: &str) -> Result<StreamClaims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    validation.leeway = 0;

    let data = decode::<StreamClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| ApiError::Unauthorized(format!("stream_token_invalid:{:?}", e.kind())))?;

    if data.claims.typ != STREAM_TOKEN_TYP {
        return Err(ApiError::Unauthorized("stream_token_invalid:WrongType".into()));
    }
    Ok(data.claims)
}
