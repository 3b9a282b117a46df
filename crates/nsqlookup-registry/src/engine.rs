//! Engine trait
//!
//! The contract every lookup-service storage backend satisfies.

use crate::error::RegistryResult;
use crate::node::{EngineInfo, NodeInfo};
use async_trait::async_trait;
use nsqlookup_core::Context;

/// Storage backend powering a lookup server
///
/// # Guarantees
/// - Node identity is `(broadcast_address, tcp_port)`; registration is an upsert
/// - Unregistering a node cascades to its topics, channels and tombstones
/// - Tombstones and inactive nodes expire within a bounded window
/// - Node lookups are sorted by identity; name lookups are sorted and deduplicated
///
/// Every operation checks `ctx` before doing any work and returns
/// [`RegistryError::Cancelled`](crate::RegistryError::Cancelled) if it is done.
/// Implementations are shared between concurrent tasks and own their locking.
#[async_trait]
pub trait Engine: Send + Sync {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Release all resources held by the engine
    ///
    /// Every other operation fails with `Closed` afterwards.
    async fn close(&self) -> RegistryResult<()>;

    /// Evaluate whether the engine can serve requests
    ///
    /// Never mutates state.
    async fn check_health(&self, ctx: &Context) -> RegistryResult<()>;

    /// Describe the engine
    async fn lookup_info(&self, ctx: &Context) -> RegistryResult<EngineInfo>;

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Register (or update) a node
    async fn register_node(&self, ctx: &Context, node: NodeInfo) -> RegistryResult<()>;

    /// Remove a node and everything it registered
    ///
    /// Unknown nodes are not an error.
    async fn unregister_node(&self, ctx: &Context, node: NodeInfo) -> RegistryResult<()>;

    /// Refresh a node's liveness
    ///
    /// Must not fail for unknown nodes.
    async fn ping_node(&self, ctx: &Context, node: NodeInfo) -> RegistryResult<()>;

    // =========================================================================
    // Topics and channels
    // =========================================================================

    /// Exclude `node` from producers of `topic` for the tombstone lifetime
    async fn tombstone_topic(&self, ctx: &Context, node: NodeInfo, topic: &str)
        -> RegistryResult<()>;

    /// Record that `node` produces `topic`
    async fn register_topic(&self, ctx: &Context, node: NodeInfo, topic: &str)
        -> RegistryResult<()>;

    /// Remove `topic` from `node`, with its channels and tombstone
    async fn unregister_topic(
        &self,
        ctx: &Context,
        node: NodeInfo,
        topic: &str,
    ) -> RegistryResult<()>;

    /// Record `channel` of `topic` on `node` (implicitly registering the topic)
    async fn register_channel(
        &self,
        ctx: &Context,
        node: NodeInfo,
        topic: &str,
        channel: &str,
    ) -> RegistryResult<()>;

    /// Remove `channel` of `topic` from `node`; the topic stays registered
    async fn unregister_channel(
        &self,
        ctx: &Context,
        node: NodeInfo,
        topic: &str,
        channel: &str,
    ) -> RegistryResult<()>;

    // =========================================================================
    // Lookups
    // =========================================================================

    /// All live nodes, sorted by identity
    async fn lookup_nodes(&self, ctx: &Context) -> RegistryResult<Vec<NodeInfo>>;

    /// Live nodes producing `topic` that are not tombstoned for it
    async fn lookup_producers(&self, ctx: &Context, topic: &str) -> RegistryResult<Vec<NodeInfo>>;

    /// Every topic registered on a live node
    async fn lookup_topics(&self, ctx: &Context) -> RegistryResult<Vec<String>>;

    /// Every channel of `topic` registered on a live node
    async fn lookup_channels(&self, ctx: &Context, topic: &str) -> RegistryResult<Vec<String>>;
}
