//! Error types for the Policy Engine

use thiserror::Error;

/// Policy Engine error types
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Policy document is structurally invalid
    #[error("Invalid policy document: {0}")]
    InvalidDocument(String),

    /// Upstream (Configuration Authority or Management Service) error
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// IO error reading a local policy file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Policy Engine operations
pub type Result<T> = std::result::Result<T, PolicyError>;

impl From<reqwest::Error> for PolicyError {
    fn from(err: reqwest::Error) -> Self {
        PolicyError::Upstream(err.to_string())
    }
}
