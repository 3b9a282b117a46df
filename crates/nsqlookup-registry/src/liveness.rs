//! Node liveness and topic tombstones
//!
//! Explicit timeouts, bounded lifetimes, observable state. Both trackers
//! take the current time as an argument so they stay pure and testable.

use crate::node::NodeKey;
use std::collections::HashMap;

// =============================================================================
// LivenessTracker
// =============================================================================

/// Tracks when each node was last seen
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    /// A node not seen for this long is considered gone
    timeout_ms: u64,
    /// Last activity per node (local clock)
    last_seen_ms: HashMap<NodeKey, u64>,
}

impl LivenessTracker {
    /// Create a tracker with the given inactivity timeout
    pub fn new(timeout_ms: u64) -> Self {
        assert!(timeout_ms > 0, "inactivity timeout must be positive");
        Self {
            timeout_ms,
            last_seen_ms: HashMap::new(),
        }
    }

    /// Record activity from a node
    pub fn touch(&mut self, key: NodeKey, now_ms: u64) {
        self.last_seen_ms.insert(key, now_ms);
    }

    /// Stop tracking a node
    pub fn forget(&mut self, key: &NodeKey) {
        self.last_seen_ms.remove(key);
    }

    /// When the node was last seen, if tracked
    pub fn last_seen_ms(&self, key: &NodeKey) -> Option<u64> {
        self.last_seen_ms.get(key).copied()
    }

    /// Whether the node has been seen within the timeout
    pub fn is_alive(&self, key: &NodeKey, now_ms: u64) -> bool {
        self.last_seen_ms
            .get(key)
            .map(|seen| now_ms.saturating_sub(*seen) < self.timeout_ms)
            .unwrap_or(false)
    }

    /// Nodes whose last activity is older than the timeout, sorted
    pub fn expired(&self, now_ms: u64) -> Vec<NodeKey> {
        let mut expired: Vec<NodeKey> = self
            .last_seen_ms
            .iter()
            .filter(|(_, seen)| now_ms.saturating_sub(**seen) >= self.timeout_ms)
            .map(|(key, _)| key.clone())
            .collect();
        expired.sort();
        expired
    }

    /// Number of tracked nodes
    pub fn len(&self) -> usize {
        self.last_seen_ms.len()
    }

    /// Whether no node is tracked
    pub fn is_empty(&self) -> bool {
        self.last_seen_ms.is_empty()
    }
}

// =============================================================================
// TombstoneSet
// =============================================================================

/// Time-bounded `(node, topic)` tombstones
#[derive(Debug, Clone)]
pub struct TombstoneSet {
    /// How long a tombstone lasts
    lifetime_ms: u64,
    /// Expiry per node and topic
    expires_at_ms: HashMap<NodeKey, HashMap<String, u64>>,
}

impl TombstoneSet {
    /// Create a set whose tombstones last `lifetime_ms`
    pub fn new(lifetime_ms: u64) -> Self {
        assert!(lifetime_ms > 0, "tombstone lifetime must be positive");
        Self {
            lifetime_ms,
            expires_at_ms: HashMap::new(),
        }
    }

    /// Tombstone `topic` on `key` starting at `now_ms`
    pub fn tombstone(&mut self, key: NodeKey, topic: &str, now_ms: u64) {
        self.expires_at_ms
            .entry(key)
            .or_default()
            .insert(topic.to_string(), now_ms.saturating_add(self.lifetime_ms));
    }

    /// Remove the tombstone for `topic` on `key`
    pub fn clear(&mut self, key: &NodeKey, topic: &str) {
        if let Some(topics) = self.expires_at_ms.get_mut(key) {
            topics.remove(topic);
            if topics.is_empty() {
                self.expires_at_ms.remove(key);
            }
        }
    }

    /// Remove every tombstone of `key`
    pub fn clear_node(&mut self, key: &NodeKey) {
        self.expires_at_ms.remove(key);
    }

    /// Whether `topic` on `key` is tombstoned at `now_ms`
    pub fn is_tombstoned(&self, key: &NodeKey, topic: &str, now_ms: u64) -> bool {
        self.expires_at_ms
            .get(key)
            .and_then(|topics| topics.get(topic))
            .map(|expires_at| now_ms < *expires_at)
            .unwrap_or(false)
    }

    /// Drop tombstones that expired at or before `now_ms`
    ///
    /// Returns how many were dropped.
    pub fn purge_expired(&mut self, now_ms: u64) -> usize {
        let mut purged = 0;
        self.expires_at_ms.retain(|_, topics| {
            let before = topics.len();
            topics.retain(|_, expires_at| now_ms < *expires_at);
            purged += before - topics.len();
            !topics.is_empty()
        });
        purged
    }

    /// Number of tombstones, expired or not
    pub fn len(&self) -> usize {
        self.expires_at_ms.values().map(HashMap::len).sum()
    }

    /// Whether no tombstone is stored
    pub fn is_empty(&self) -> bool {
        self.expires_at_ms.is_empty()
    }
}
