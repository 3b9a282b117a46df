//! Configuration for the in-memory engine
//!
//! Explicit defaults, validation, reasonable limits.

use nsqlookup_core::constants::*;
use nsqlookup_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Expiry windows for [`MemoryEngine`](crate::MemoryEngine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEngineConfig {
    /// Time after a node's last ping before it is treated as gone
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,

    /// How long a topic tombstone excludes a node from producer lookups
    #[serde(default = "default_tombstone_lifetime_ms")]
    pub tombstone_lifetime_ms: u64,

    /// Interval between background eviction sweeps
    #[serde(default = "default_eviction_interval_ms")]
    pub eviction_interval_ms: u64,
}

fn default_node_timeout_ms() -> u64 {
    NODE_INACTIVE_TIMEOUT_MS_DEFAULT
}

fn default_tombstone_lifetime_ms() -> u64 {
    TOMBSTONE_LIFETIME_MS_DEFAULT
}

fn default_eviction_interval_ms() -> u64 {
    EVICTION_INTERVAL_MS_DEFAULT
}

impl Default for MemoryEngineConfig {
    fn default() -> Self {
        Self {
            node_timeout_ms: default_node_timeout_ms(),
            tombstone_lifetime_ms: default_tombstone_lifetime_ms(),
            eviction_interval_ms: default_eviction_interval_ms(),
        }
    }
}

impl MemoryEngineConfig {
    /// Set the node inactivity timeout
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the tombstone lifetime
    pub fn with_tombstone_lifetime(mut self, lifetime: Duration) -> Self {
        self.tombstone_lifetime_ms = lifetime.as_millis() as u64;
        self
    }

    /// Set the eviction sweep interval
    pub fn with_eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        check_range(
            "engine.node_timeout_ms",
            self.node_timeout_ms,
            NODE_INACTIVE_TIMEOUT_MS_MAX,
        )?;
        check_range(
            "engine.tombstone_lifetime_ms",
            self.tombstone_lifetime_ms,
            TOMBSTONE_LIFETIME_MS_MAX,
        )?;
        check_range(
            "engine.eviction_interval_ms",
            self.eviction_interval_ms,
            EVICTION_INTERVAL_MS_MAX,
        )?;
        Ok(())
    }
}

fn check_range(field: &str, value: u64, max: u64) -> Result<()> {
    if value == 0 {
        return Err(Error::invalid_configuration(field, "must be greater than 0"));
    }
    if value > max {
        return Err(Error::invalid_configuration(
            field,
            format!("{} exceeds limit {}", value, max),
        ));
    }
    Ok(())
}
