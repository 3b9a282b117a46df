//! nsqlookup Registry
//!
//! Node, topic and channel registry for the nsqlookup lookup tier.
//!
//! # Overview
//!
//! The registry provides:
//! - The [`Engine`] contract every storage backend implements
//! - The [`NodeInfo`] data model with identity ordering and address derivation
//! - [`MemoryEngine`], an in-memory backend with tombstone and inactivity expiry
//!
//! # Guarantees
//! - Node identity is `(broadcast_address, tcp_port)`
//! - Lookups return nodes sorted by identity and names sorted lexicographically
//! - Tombstones and inactive nodes always expire

mod config;
mod engine;
mod error;
mod liveness;
mod memory;
mod node;

pub use config::MemoryEngineConfig;
pub use engine::Engine;
pub use error::{RegistryError, RegistryResult};
pub use liveness::{LivenessTracker, TombstoneSet};
pub use memory::MemoryEngine;
pub use node::{
    broadcast_address, join_host_port, sort_nodes, sort_strings, split_host_port, EngineInfo,
    NodeInfo, NodeKey,
};
