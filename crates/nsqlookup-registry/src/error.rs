//! Registry error types
//!
//! Explicit error variants with context.

use nsqlookup_core::ContextError;
use thiserror::Error;

/// Registry-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Storage operation failed inside the backend
    #[error("backend error: {reason}")]
    Backend { reason: String },

    /// Backend cannot currently serve requests
    #[error("engine unhealthy: {reason}")]
    Health { reason: String },

    /// The caller's context finished before the operation ran
    #[error("operation aborted: {0}")]
    Cancelled(#[from] ContextError),

    /// Topic or channel name rejected
    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// The engine was closed
    #[error("engine is closed")]
    Closed,
}

impl RegistryError {
    /// Create a backend error
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// Create a health error
    pub fn health(reason: impl Into<String>) -> Self {
        Self::Health {
            reason: reason.into(),
        }
    }

    /// Check if this error indicates a retriable condition
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Health { .. })
    }
}

/// Result type for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::backend("disk full");
        assert!(err.to_string().contains("disk full"));

        let err = RegistryError::InvalidName {
            kind: "topic",
            name: String::new(),
            reason: "must not be empty".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid topic name \"\": must not be empty"
        );
    }

    #[test]
    fn test_error_retriable() {
        assert!(RegistryError::backend("timeout").is_retriable());
        assert!(RegistryError::health("connection lost").is_retriable());
        assert!(!RegistryError::Closed.is_retriable());
        assert!(!RegistryError::Cancelled(ContextError::Cancelled).is_retriable());
    }

    #[test]
    fn test_context_error_converts() {
        let err: RegistryError = ContextError::DeadlineExceeded.into();
        assert_eq!(err, RegistryError::Cancelled(ContextError::DeadlineExceeded));
    }
}
