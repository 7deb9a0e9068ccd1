//! API error type
//!
//! Every failure surfaces as a JSON body `{"detail": "<machine-readable>"}`
//! with the status code mandated by the error taxonomy: 4xx for caller
//! mistakes (never retried), 409 for races the caller resolves by
//! re-reading, 502 for unreachable peers, 5xx for internal failures that
//! left no partial state behind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Management Service API error
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input (bad HMAC, bad timestamp, ...)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid bearer token
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required role
    #[error("forbidden")]
    Forbidden,

    /// Entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// Write race; caller retries after re-reading
    #[error("{0}")]
    Conflict(String),

    /// Payload failed validation
    #[error("{0}")]
    Unprocessable(String),

    /// Peer service unreachable or non-200
    #[error("{0}")]
    Upstream(String),

    /// Storage or audit failure; the operation was not applied
    #[error("{0}")]
    Internal(String),
}

/// Result type for handler functions
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("❌ Request failed: {}", self);
        }
        (status, Json(json!({"detail": self.to_string()}))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                // unique violation: a concurrent writer got there first
                Some("23505") => return ApiError::Conflict("version_conflict".to_string()),
                // foreign key violation: the referenced entity is gone
                Some("23503") => {
                    return ApiError::NotFound("referenced_entity_not_found".to_string())
                }
                _ => {}
            }
        }
        ApiError::Internal(format!("database_error:{err}"))
    }
}

impl From<wallgrid_audit::AuditError> for ApiError {
    fn from(err: wallgrid_audit::AuditError) -> Self {
        ApiError::Internal(format!("audit_error:{err}"))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("serialization_error:{err}"))
    }
}
