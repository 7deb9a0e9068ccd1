//! Error types for the Configuration Authority

use thiserror::Error;

/// Configuration Authority error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML could not be parsed at all
    #[error("parse_error: {0}")]
    Parse(String),

    /// The document parsed but failed schema or semantic validation
    #[error("invalid configuration: {}", .0.join("; "))]
    Rejected(Vec<String>),

    /// IO error reading the config file or writing the event log
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Flatten into the error-string list the dry-run surface reports.
    pub fn error_strings(&self) -> Vec<String> {
        match self {
            ConfigError::Rejected(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Result type for Configuration Authority operations
pub type Result<T> = std::result::Result<T, ConfigError>;
