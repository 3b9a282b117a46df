//! Resolver error types
//!
//! Errors are `Clone` so a cached failure can be handed to every caller
//! within the TTL window.

use nsqlookup_core::{ContextError, HttpError};
use thiserror::Error;

/// Result type for resolvers
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Errors produced while discovering lookup servers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// The caller's context finished first
    #[error("resolve aborted: {0}")]
    Cancelled(#[from] ContextError),

    /// Consul answered with an unexpected status
    #[error("error looking up {endpoint} on consul agent at {address}: {status} {reason}")]
    CatalogStatus {
        endpoint: String,
        address: String,
        status: u16,
        reason: String,
    },

    /// Consul could not be reached
    #[error("catalog request failed: {0}")]
    Transport(#[from] HttpError),

    /// A catalog response was not the expected JSON
    #[error("failed to decode {endpoint} response: {reason}")]
    Decode { endpoint: String, reason: String },

    /// Every child of a fan-out failed
    #[error("{} resolvers failed: {}", .0.len(), join_messages(.0))]
    Aggregate(Vec<ResolveError>),

    /// A fan-out task panicked or was aborted
    #[error("resolver task failed: {reason}")]
    Join { reason: String },
}

impl ResolveError {
    /// Create a decode error
    pub fn decode(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only reports that the caller gave up
    ///
    /// An aggregate counts when every one of its errors is a cancellation.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled(_) => true,
            Self::Aggregate(errors) => {
                !errors.is_empty() && errors.iter().all(ResolveError::is_cancellation)
            }
            _ => false,
        }
    }
}

fn join_messages(errors: &[ResolveError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
