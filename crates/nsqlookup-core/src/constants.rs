//! Limits and defaults for nsqlookup
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Registry Limits
// =============================================================================

/// Default time after the last ping before a node is treated as gone (5 min)
pub const NODE_INACTIVE_TIMEOUT_MS_DEFAULT: u64 = 5 * 60 * 1000;

/// Maximum node inactivity timeout (24 hours)
pub const NODE_INACTIVE_TIMEOUT_MS_MAX: u64 = 24 * 60 * 60 * 1000;

/// Default lifetime of a topic tombstone (45 sec)
pub const TOMBSTONE_LIFETIME_MS_DEFAULT: u64 = 45 * 1000;

/// Maximum lifetime of a topic tombstone (24 hours)
pub const TOMBSTONE_LIFETIME_MS_MAX: u64 = 24 * 60 * 60 * 1000;

/// Default interval between sweeps of expired nodes and tombstones (5 sec)
pub const EVICTION_INTERVAL_MS_DEFAULT: u64 = 5 * 1000;

/// Maximum interval between eviction sweeps (10 min)
pub const EVICTION_INTERVAL_MS_MAX: u64 = 10 * 60 * 1000;

// =============================================================================
// Resolver Limits
// =============================================================================

/// Default Consul agent address
pub const CONSUL_ADDRESS_DEFAULT: &str = "http://localhost:8500";

/// Default service name looked up in the Consul catalog
pub const CONSUL_SERVICE_DEFAULT: &str = "nsqlookupd";

/// Default timeout for a single Consul request (10 sec)
pub const CONSUL_REQUEST_TIMEOUT_MS_DEFAULT: u64 = 10 * 1000;

/// Maximum timeout for a single Consul request (2 min)
pub const CONSUL_REQUEST_TIMEOUT_MS_MAX: u64 = 2 * 60 * 1000;

/// Maximum TTL of a cached resolver result (1 hour)
pub const RESOLVER_CACHE_TTL_MS_MAX: u64 = 60 * 60 * 1000;

/// Maximum number of children of a multi resolver
pub const RESOLVER_CHILDREN_COUNT_MAX: usize = 64;

/// Maximum nesting depth of a configured resolver chain
pub const RESOLVER_NESTING_DEPTH_MAX: usize = 8;

// =============================================================================
// Compile-time Assertions
// =============================================================================

const _: () = {
    assert!(TOMBSTONE_LIFETIME_MS_DEFAULT <= TOMBSTONE_LIFETIME_MS_MAX);
    assert!(NODE_INACTIVE_TIMEOUT_MS_DEFAULT <= NODE_INACTIVE_TIMEOUT_MS_MAX);
    assert!(EVICTION_INTERVAL_MS_DEFAULT <= EVICTION_INTERVAL_MS_MAX);
    assert!(CONSUL_REQUEST_TIMEOUT_MS_DEFAULT <= CONSUL_REQUEST_TIMEOUT_MS_MAX);
};
