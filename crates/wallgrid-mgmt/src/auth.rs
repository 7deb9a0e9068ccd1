//! Bearer token authentication and role-based authorization
//!
//! Tokens are verified offline with RS256 against a configured PEM public
//! key or an offline JWKS file (key selected by `kid`). Roles come from
//! `realm_access.roles` plus `resource_access.<client_id>.roles`; the
//! `admin` role is a superset of every other role.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract the raw token from an `Authorization: Bearer <token>` header.
pub fn parse_bearer(header: Option<&str>) -> Result<String, ApiError> {
    let header = header.ok_or_else(|| ApiError::Unauthorized("missing_authorization".into()))?;
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
            Ok(token.to_string())
        }
        _ => Err(ApiError::Unauthorized("invalid_authorization".into())),
    }
}

/// Roles from realm and client claims, sorted and deduplicated.
pub fn extract_roles(claims: &serde_json::Value, client_id: &str) -> Vec<String> {
    let mut roles = BTreeSet::new();

    if let Some(realm_roles) = claims
        .pointer("/realm_access/roles")
        .and_then(serde_json::Value::as_array)
    {
        for role in realm_roles.iter().filter_map(serde_json::Value::as_str) {
            roles.insert(role.to_string());
        }
    }

    if let Some(client_roles) = claims
        .get("resource_access")
        .and_then(|res| res.get(client_id))
        .and_then(|client| client.get("roles"))
        .and_then(serde_json::Value::as_array)
    {
        for role in client_roles.iter().filter_map(serde_json::Value::as_str) {
            roles.insert(role.to_string());
        }
    }

    roles.into_iter().collect()
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    #[serde(default)]
    keys: Vec<JwkKey>,
}

#[derive(Debug, Deserialize)]
struct JwkKey {
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

struct JwksEntry {
    kid: Option<String>,
    key: DecodingKey,
}

/// Offline RS256 verifier.
pub struct JwtVerifier {
    pem_key: Option<DecodingKey>,
    jwks: Vec<JwksEntry>,
    issuer: Option<String>,
    audience: Option<String>,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("pem_key", &self.pem_key.is_some())
            .field("jwks_len", &self.jwks.len())
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl JwtVerifier {
    /// Build from the configured PEM key and/or JWKS file.
    pub fn new(
        public_key_pem: &str,
        jwks_path: &str,
        issuer: &str,
        audience: &str,
    ) -> Result<Self, ApiError> {
        let pem_key = if public_key_pem.trim().is_empty() {
            None
        } else {
            Some(
                DecodingKey::from_rsa_pem(public_key_pem.trim().as_bytes())
                    .map_err(|e| ApiError::Internal(format!("invalid_public_key:{e}")))?,
            )
        };

        let mut jwks = Vec::new();
        if !jwks_path.trim().is_empty() {
            let text = std::fs::read_to_string(jwks_path.trim())
                .map_err(|e| ApiError::Internal(format!("jwks_unreadable:{e}")))?;
            let doc: JwksDocument = serde_json::from_str(&text)
                .map_err(|e| ApiError::Internal(format!("jwks_invalid:{e}")))?;
            for key in doc.keys {
                if let (Some(n), Some(e)) = (&key.n, &key.e) {
                    if let Ok(decoding_key) = DecodingKey::from_rsa_components(n, e) {
                        jwks.push(JwksEntry {
                            kid: key.kid.clone(),
                            key: decoding_key,
                        });
                    }
                }
            }
        }

        Ok(Self {
            pem_key,
            jwks,
            issuer: non_empty(issuer),
            audience: non_empty(audience),
        })
    }

    fn key_for(&self, token: &str) -> Result<&DecodingKey, ApiError> {
        if let Some(key) = &self.pem_key {
            return Ok(key);
        }
        if self.jwks.is_empty() {
            return Err(ApiError::Internal("no_public_key_configured".into()));
        }

        let header = decode_header(token)
            .map_err(|e| ApiError::Unauthorized(format!("jwt_invalid:{:?}", e.kind())))?;
        if header.alg != Algorithm::RS256 {
            return Err(ApiError::Unauthorized("unsupported_jwt_alg".into()));
        }

        let kid = header.kid;
        self.jwks
            .iter()
            .find(|entry| kid.is_none() || entry.kid == kid)
            .map(|entry| &entry.key)
            .ok_or_else(|| ApiError::Unauthorized("jwks_kid_not_found".into()))
    }

    /// Verify signature and registered claims; return the claim set.
    pub fn verify(&self, token: &str) -> Result<serde_json::Value, ApiError> {
        let header = decode_header(token)
            .map_err(|e| ApiError::Unauthorized(format!("jwt_invalid:{:?}", e.kind())))?;
        if header.alg != Algorithm::RS256 {
            return Err(ApiError::Unauthorized("unsupported_jwt_alg".into()));
        }

        let key = self.key_for(token)?;
        let mut validation = Validation::new(Algorithm::RS256);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss]);
        }

        decode::<serde_json::Value>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| ApiError::Unauthorized(format!("jwt_invalid:{:?}", e.kind())))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A verified caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: serde_json::Value,
    pub roles: Vec<String>,
}

impl AuthUser {
    /// Audit actor: preferred username, else subject, else "unknown".
    pub fn actor(&self) -> String {
        self.claims
            .get("preferred_username")
            .and_then(serde_json::Value::as_str)
            .or_else(|| self.claims.get("sub").and_then(serde_json::Value::as_str))
            .unwrap_or("unknown")
            .to_string()
    }

    pub fn operator_id(&self) -> String {
        self.claims
            .get("sub")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Operator tags from the `tags` claim, falling back to `groups`.
    pub fn operator_tags(&self) -> Vec<String> {
        for claim in ["tags", "groups"] {
            if let Some(values) = self.claims.get(claim).and_then(serde_json::Value::as_array) {
                return values
                    .iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
            }
        }
        Vec::new()
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "admin")
    }

    /// Authorize admin-only operations.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    /// Authorize: `admin` passes everything, otherwise the caller must
    /// hold at least one of the listed roles.
    pub fn require_role(&self, allowed: &[&str]) -> Result<(), ApiError> {
        if self.is_admin() {
            return Ok(());
        }
        if self.roles.iter().any(|r| allowed.contains(&r.as_str())) {
            return Ok(());
        }
        Err(ApiError::Forbidden)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = parse_bearer(header)?;
        let claims = state.verifier.verify(&token)?;
        let roles = extract_roles(&claims, &state.settings.oidc_client_id);
        Ok(AuthUser { claims, roles })
    }
}
