//! Error types shared by nsqlookup crates
//!
//! Explicit error variants with context, using thiserror.

use thiserror::Error;

/// Result type alias for configuration and setup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and setup errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl Error {
    /// Create an invalid configuration error
    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }
}
