//! Error types for the audit chain

use thiserror::Error;

/// Audit chain error types
#[derive(Debug, Error)]
pub enum AuditError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

impl From<sqlx::Error> for AuditError {
    fn from(err: sqlx::Error) -> Self {
        AuditError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Serialization(err.to_string())
    }
}
