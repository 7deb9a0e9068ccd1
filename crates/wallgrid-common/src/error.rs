//! Error types for Wallgrid
//!
//! This module defines the error type shared by the Wallgrid services.
//! All errors carry a short context string describing what went wrong.

use std::io;
use thiserror::Error;

/// Wallgrid error types
#[derive(Debug, Error)]
pub enum WallgridError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration document rejected by validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Authorization error
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Upstream service error
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflicting state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for Wallgrid operations
pub type Result<T> = std::result::Result<T, WallgridError>;

impl From<serde_json::Error> for WallgridError {
    fn from(err: serde_json::Error) -> Self {
        WallgridError::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for WallgridError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        WallgridError::Timeout(err.to_string())
    }
}

impl From<String> for WallgridError {
    fn from(err: String) -> Self {
        WallgridError::Other(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_error_display() {
        let err = WallgridError::Config("test".to_string());
        assert_eq!(err.to_string(), "Configuration error: test");

        let err = WallgridError::Validation("test".to_string());
        assert_eq!(err.to_string(), "Validation error: test");

        let err = WallgridError::Auth("test".to_string());
        assert_eq!(err.to_string(), "Authentication error: test");

        let err = WallgridError::Database("test".to_string());
        assert_eq!(err.to_string(), "Database error: test");

        let err = WallgridError::Upstream("test".to_string());
        assert_eq!(err.to_string(), "Upstream error: test");

        let err = WallgridError::NotFound("test".to_string());
        assert_eq!(err.to_string(), "Resource not found: test");

        let err = WallgridError::Conflict("test".to_string());
        assert_eq!(err.to_string(), "Conflict: test");
    }

    #[test]
    fn test_error_conversion_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test");
        let err: WallgridError = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_conversion_from_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: WallgridError = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
