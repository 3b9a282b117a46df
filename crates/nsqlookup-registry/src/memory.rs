//! In-memory engine
//!
//! Suitable for a single lookup server or for testing. All state is lost
//! on restart.
//!
//! Inactive nodes and expired tombstones are hidden from lookups as soon as
//! they expire (checked on read) and physically dropped by
//! [`MemoryEngine::evict_expired`], which [`MemoryEngine::spawn_evictor`]
//! runs on an interval.

use crate::config::MemoryEngineConfig;
use crate::engine::Engine;
use crate::error::{RegistryError, RegistryResult};
use crate::liveness::{LivenessTracker, TombstoneSet};
use crate::node::{sort_nodes, sort_strings, EngineInfo, NodeInfo, NodeKey};
use async_trait::async_trait;
use nsqlookup_core::{Context, TimeProvider, WallClockTime};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Engine type reported by [`Engine::lookup_info`]
const ENGINE_TYPE: &str = "memory";

/// A node's registration: its record plus topic -> channels
#[derive(Debug, Clone)]
struct NodeRecord {
    info: NodeInfo,
    topics: BTreeMap<String, BTreeSet<String>>,
}

impl NodeRecord {
    fn new(info: NodeInfo) -> Self {
        Self {
            info,
            topics: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
struct State {
    nodes: BTreeMap<NodeKey, NodeRecord>,
    liveness: LivenessTracker,
    tombstones: TombstoneSet,
    closed: bool,
}

impl State {
    /// Forget a node that timed out but has not been swept yet
    ///
    /// Its topics, channels and tombstones go with it, exactly as if the
    /// evictor had already run.
    fn drop_if_expired(&mut self, key: &NodeKey, now_ms: u64) {
        if self.liveness.last_seen_ms(key).is_some() && !self.liveness.is_alive(key, now_ms) {
            debug!(node = %key, "Dropping expired node before update");
            self.remove(key);
        }
    }

    /// Insert or refresh a node, returning its record
    fn upsert(&mut self, node: NodeInfo, now_ms: u64) -> &mut NodeRecord {
        let key = node.key();
        self.drop_if_expired(&key, now_ms);
        self.liveness.touch(key.clone(), now_ms);

        let record = self
            .nodes
            .entry(key)
            .or_insert_with(|| NodeRecord::new(node.clone()));
        record.info = node;
        record
    }

    /// Refresh liveness of a known, live node and return its record
    fn touch(&mut self, key: &NodeKey, now_ms: u64) -> Option<&mut NodeRecord> {
        self.drop_if_expired(key, now_ms);
        let record = self.nodes.get_mut(key)?;
        self.liveness.touch(key.clone(), now_ms);
        Some(record)
    }

    fn remove(&mut self, key: &NodeKey) -> bool {
        self.liveness.forget(key);
        self.tombstones.clear_node(key);
        self.nodes.remove(key).is_some()
    }

    fn live_nodes(&self, now_ms: u64) -> impl Iterator<Item = (&NodeKey, &NodeRecord)> {
        self.nodes
            .iter()
            .filter(move |(key, _)| self.liveness.is_alive(key, now_ms))
    }
}

/// In-memory [`Engine`] implementation
pub struct MemoryEngine {
    state: RwLock<State>,
    config: MemoryEngineConfig,
    time: Arc<dyn TimeProvider>,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("config", &self.config)
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

impl MemoryEngine {
    /// Create an engine with default expiry windows and the wall clock
    pub fn new() -> Self {
        Self::build(MemoryEngineConfig::default(), Arc::new(WallClockTime::new()))
    }

    /// Create an engine with custom expiry windows
    pub fn with_config(config: MemoryEngineConfig) -> nsqlookup_core::Result<Self> {
        Self::with_clock(config, Arc::new(WallClockTime::new()))
    }

    /// Create an engine with custom expiry windows and time source
    pub fn with_clock(
        config: MemoryEngineConfig,
        time: Arc<dyn TimeProvider>,
    ) -> nsqlookup_core::Result<Self> {
        config.validate()?;
        Ok(Self::build(config, time))
    }

    fn build(config: MemoryEngineConfig, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            state: RwLock::new(State {
                nodes: BTreeMap::new(),
                liveness: LivenessTracker::new(config.node_timeout_ms),
                tombstones: TombstoneSet::new(config.tombstone_lifetime_ms),
                closed: false,
            }),
            config,
            time,
        }
    }

    /// The engine's expiry configuration
    pub fn config(&self) -> &MemoryEngineConfig {
        &self.config
    }

    async fn read(&self, ctx: &Context) -> RegistryResult<RwLockReadGuard<'_, State>> {
        let state = ctx.run(self.state.read()).await?;
        if state.closed {
            return Err(RegistryError::Closed);
        }
        Ok(state)
    }

    async fn write(&self, ctx: &Context) -> RegistryResult<RwLockWriteGuard<'_, State>> {
        let state = ctx.run(self.state.write()).await?;
        if state.closed {
            return Err(RegistryError::Closed);
        }
        Ok(state)
    }

    /// Drop inactive nodes (with everything they registered) and expired tombstones
    ///
    /// Returns the identities of the evicted nodes, sorted.
    pub async fn evict_expired(&self) -> RegistryResult<Vec<NodeKey>> {
        let now_ms = self.time.now_ms();
        let mut state = self.write(&Context::background()).await?;

        let expired = state.liveness.expired(now_ms);
        for key in &expired {
            state.remove(key);
        }
        let purged = state.tombstones.purge_expired(now_ms);

        if !expired.is_empty() {
            info!(
                count = expired.len(),
                tombstones = purged,
                "Evicted inactive nodes"
            );
        } else if purged > 0 {
            debug!(tombstones = purged, "Purged expired tombstones");
        }

        Ok(expired)
    }

    /// Run [`evict_expired`](Self::evict_expired) every eviction interval until
    /// `ctx` is done or the engine is closed
    pub fn spawn_evictor(self: &Arc<Self>, ctx: Context) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let interval = Duration::from_millis(self.config.eviction_interval_ms);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                if ctx.run(ticker.tick()).await.is_err() {
                    break;
                }

                match engine.evict_expired().await {
                    Ok(_) => {}
                    Err(RegistryError::Closed) => break,
                    Err(e) => warn!(error = %e, "Eviction sweep failed"),
                }
            }

            debug!("Evictor stopped");
        })
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Names are opaque; the only requirement is that they are non-empty
fn validate_name(kind: &'static str, name: &str) -> RegistryResult<()> {
    if name.is_empty() {
        return Err(RegistryError::InvalidName {
            kind,
            name: name.to_string(),
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

fn validate_topic(topic: &str) -> RegistryResult<()> {
    validate_name("topic", topic)
}

fn validate_channel(channel: &str) -> RegistryResult<()> {
    validate_name("channel", channel)
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn close(&self) -> RegistryResult<()> {
        let mut state = self.state.write().await;
        if state.closed {
            return Ok(());
        }

        state.closed = true;
        state.nodes.clear();
        state.liveness = LivenessTracker::new(self.config.node_timeout_ms);
        state.tombstones = TombstoneSet::new(self.config.tombstone_lifetime_ms);

        info!("Memory engine closed");
        Ok(())
    }

    async fn check_health(&self, ctx: &Context) -> RegistryResult<()> {
        let state = ctx.run(self.state.read()).await?;
        if state.closed {
            return Err(RegistryError::health("engine is closed"));
        }
        Ok(())
    }

    async fn lookup_info(&self, ctx: &Context) -> RegistryResult<EngineInfo> {
        let _state = self.read(ctx).await?;
        Ok(EngineInfo::new(ENGINE_TYPE, env!("CARGO_PKG_VERSION")))
    }

    #[instrument(skip(self, ctx, node), fields(node = %node.key()))]
    async fn register_node(&self, ctx: &Context, node: NodeInfo) -> RegistryResult<()> {
        let now_ms = self.time.now_ms();
        let mut state = self.write(ctx).await?;
        state.upsert(node, now_ms);

        debug!("Node registered");
        Ok(())
    }

    #[instrument(skip(self, ctx, node), fields(node = %node.key()))]
    async fn unregister_node(&self, ctx: &Context, node: NodeInfo) -> RegistryResult<()> {
        let mut state = self.write(ctx).await?;
        if state.remove(&node.key()) {
            debug!("Node unregistered");
        }
        Ok(())
    }

    #[instrument(skip(self, ctx, node), fields(node = %node.key()))]
    async fn ping_node(&self, ctx: &Context, node: NodeInfo) -> RegistryResult<()> {
        let now_ms = self.time.now_ms();
        let mut state = self.write(ctx).await?;

        let key = node.key();
        if state.touch(&key, now_ms).is_none() {
            debug!("Ping from unknown node, registering it");
            state.upsert(node, now_ms);
        }
        Ok(())
    }

    #[instrument(skip(self, ctx, node), fields(node = %node.key()))]
    async fn tombstone_topic(
        &self,
        ctx: &Context,
        node: NodeInfo,
        topic: &str,
    ) -> RegistryResult<()> {
        validate_topic(topic)?;
        let now_ms = self.time.now_ms();
        let mut state = self.write(ctx).await?;

        // Unknown nodes are tombstoned too; the entry expires on its own
        let key = node.key();
        state.touch(&key, now_ms);
        state.tombstones.tombstone(key, topic, now_ms);

        debug!(topic, "Topic tombstoned");
        Ok(())
    }

    #[instrument(skip(self, ctx, node), fields(node = %node.key()))]
    async fn register_topic(
        &self,
        ctx: &Context,
        node: NodeInfo,
        topic: &str,
    ) -> RegistryResult<()> {
        validate_topic(topic)?;
        let now_ms = self.time.now_ms();
        let mut state = self.write(ctx).await?;

        let key = node.key();
        state.upsert(node, now_ms).topics.entry(topic.to_string()).or_default();
        state.tombstones.clear(&key, topic);
        Ok(())
    }

    #[instrument(skip(self, ctx, node), fields(node = %node.key()))]
    async fn unregister_topic(
        &self,
        ctx: &Context,
        node: NodeInfo,
        topic: &str,
    ) -> RegistryResult<()> {
        validate_topic(topic)?;
        let now_ms = self.time.now_ms();
        let mut state = self.write(ctx).await?;

        let key = node.key();
        if let Some(record) = state.touch(&key, now_ms) {
            record.topics.remove(topic);
        }
        state.tombstones.clear(&key, topic);
        Ok(())
    }

    #[instrument(skip(self, ctx, node), fields(node = %node.key()))]
    async fn register_channel(
        &self,
        ctx: &Context,
        node: NodeInfo,
        topic: &str,
        channel: &str,
    ) -> RegistryResult<()> {
        validate_topic(topic)?;
        validate_channel(channel)?;
        let now_ms = self.time.now_ms();
        let mut state = self.write(ctx).await?;

        state
            .upsert(node, now_ms)
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(channel.to_string());
        Ok(())
    }

    #[instrument(skip(self, ctx, node), fields(node = %node.key()))]
    async fn unregister_channel(
        &self,
        ctx: &Context,
        node: NodeInfo,
        topic: &str,
        channel: &str,
    ) -> RegistryResult<()> {
        validate_topic(topic)?;
        validate_channel(channel)?;
        let now_ms = self.time.now_ms();
        let mut state = self.write(ctx).await?;

        if let Some(channels) = state
            .touch(&node.key(), now_ms)
            .and_then(|record| record.topics.get_mut(topic))
        {
            channels.remove(channel);
        }
        Ok(())
    }

    async fn lookup_nodes(&self, ctx: &Context) -> RegistryResult<Vec<NodeInfo>> {
        let now_ms = self.time.now_ms();
        let state = self.read(ctx).await?;

        let nodes = state
            .live_nodes(now_ms)
            .map(|(_, record)| record.info.clone())
            .collect();
        Ok(sort_nodes(nodes))
    }

    async fn lookup_producers(&self, ctx: &Context, topic: &str) -> RegistryResult<Vec<NodeInfo>> {
        let now_ms = self.time.now_ms();
        let state = self.read(ctx).await?;

        let producers = state
            .live_nodes(now_ms)
            .filter(|(key, record)| {
                record.topics.contains_key(topic)
                    && !state.tombstones.is_tombstoned(key, topic, now_ms)
            })
            .map(|(_, record)| record.info.clone())
            .collect();
        Ok(sort_nodes(producers))
    }

    async fn lookup_topics(&self, ctx: &Context) -> RegistryResult<Vec<String>> {
        let now_ms = self.time.now_ms();
        let state = self.read(ctx).await?;

        let topics = state
            .live_nodes(now_ms)
            .flat_map(|(_, record)| record.topics.keys().cloned())
            .collect();
        Ok(sort_strings(topics))
    }

    async fn lookup_channels(&self, ctx: &Context, topic: &str) -> RegistryResult<Vec<String>> {
        let now_ms = self.time.now_ms();
        let state = self.read(ctx).await?;

        let channels = state
            .live_nodes(now_ms)
            .filter_map(|(_, record)| record.topics.get(topic))
            .flat_map(|channels| channels.iter().cloned())
            .collect();
        Ok(sort_strings(channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsqlookup_core::{ContextError, ManualClock};

    fn test_node(n: u16) -> NodeInfo {
        NodeInfo::new(format!("10.0.0.{}", n), 4150, 4151)
            .with_hostname(format!("nsqd-{}", n))
            .with_version("1.2.1")
    }

    fn test_engine() -> (MemoryEngine, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let config = MemoryEngineConfig::default()
            .with_node_timeout(Duration::from_secs(60))
            .with_tombstone_lifetime(Duration::from_secs(10));
        let engine = MemoryEngine::with_clock(config, Arc::new(clock.clone())).unwrap();
        (engine, clock)
    }

    #[tokio::test]
    async fn test_register_node_is_idempotent() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine.register_node(&ctx, test_node(1)).await.unwrap();
        engine.register_node(&ctx, test_node(1)).await.unwrap();

        let nodes = engine.lookup_nodes(&ctx).await.unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_register_node_updates_record() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine.register_node(&ctx, test_node(1)).await.unwrap();
        engine
            .register_node(&ctx, test_node(1).with_version("1.3.0"))
            .await
            .unwrap();

        let nodes = engine.lookup_nodes(&ctx).await.unwrap();
        assert_eq!(nodes[0].version, "1.3.0");
    }

    #[tokio::test]
    async fn test_unregister_unknown_node_succeeds() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine.unregister_node(&ctx, test_node(9)).await.unwrap();
        assert!(engine.lookup_nodes(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ping_unknown_node_registers_it() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine.ping_node(&ctx, test_node(1)).await.unwrap();
        assert_eq!(engine.lookup_nodes(&ctx).await.unwrap(), vec![test_node(1)]);
    }

    #[tokio::test]
    async fn test_ping_does_not_change_record() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine.register_node(&ctx, test_node(1)).await.unwrap();
        engine
            .ping_node(&ctx, test_node(1).with_version("9.9.9"))
            .await
            .unwrap();

        let nodes = engine.lookup_nodes(&ctx).await.unwrap();
        assert_eq!(nodes[0].version, "1.2.1");
    }

    #[tokio::test]
    async fn test_register_channel_implies_topic() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine
            .register_channel(&ctx, test_node(1), "orders", "billing")
            .await
            .unwrap();

        assert_eq!(engine.lookup_topics(&ctx).await.unwrap(), vec!["orders"]);
        assert_eq!(
            engine.lookup_producers(&ctx, "orders").await.unwrap(),
            vec![test_node(1)]
        );
        assert_eq!(
            engine.lookup_channels(&ctx, "orders").await.unwrap(),
            vec!["billing"]
        );
    }

    #[tokio::test]
    async fn test_unregister_last_channel_keeps_topic() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine
            .register_channel(&ctx, test_node(1), "orders", "billing")
            .await
            .unwrap();
        engine
            .unregister_channel(&ctx, test_node(1), "orders", "billing")
            .await
            .unwrap();

        assert!(engine.lookup_channels(&ctx, "orders").await.unwrap().is_empty());
        assert_eq!(engine.lookup_topics(&ctx).await.unwrap(), vec!["orders"]);
    }

    #[tokio::test]
    async fn test_unregister_topic_removes_channels() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine
            .register_channel(&ctx, test_node(1), "orders", "billing")
            .await
            .unwrap();
        engine
            .unregister_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();

        assert!(engine.lookup_topics(&ctx).await.unwrap().is_empty());

        // Re-registering the topic does not bring the channels back
        engine
            .register_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();
        assert!(engine.lookup_channels(&ctx, "orders").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tombstone_hides_producer_until_expiry() {
        let (engine, clock) = test_engine();
        let ctx = Context::background();

        engine
            .register_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();
        engine
            .register_topic(&ctx, test_node(2), "orders")
            .await
            .unwrap();
        engine
            .tombstone_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();

        let producers = engine.lookup_producers(&ctx, "orders").await.unwrap();
        assert_eq!(producers, vec![test_node(2)]);

        // Topic and channels are kept while tombstoned
        assert_eq!(engine.lookup_topics(&ctx).await.unwrap(), vec!["orders"]);

        clock.advance_ms(10_000);
        engine.ping_node(&ctx, test_node(1)).await.unwrap();
        engine.ping_node(&ctx, test_node(2)).await.unwrap();

        let producers = engine.lookup_producers(&ctx, "orders").await.unwrap();
        assert_eq!(producers, vec![test_node(1), test_node(2)]);
    }

    #[tokio::test]
    async fn test_register_topic_clears_tombstone() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine
            .register_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();
        engine
            .tombstone_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();
        assert!(engine
            .lookup_producers(&ctx, "orders")
            .await
            .unwrap()
            .is_empty());

        engine
            .register_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();
        assert_eq!(
            engine.lookup_producers(&ctx, "orders").await.unwrap(),
            vec![test_node(1)]
        );
    }

    #[tokio::test]
    async fn test_inactive_node_hidden_then_evicted() {
        let (engine, clock) = test_engine();
        let ctx = Context::background();

        engine
            .register_channel(&ctx, test_node(1), "orders", "billing")
            .await
            .unwrap();
        engine.register_node(&ctx, test_node(2)).await.unwrap();

        clock.advance_ms(30_000);
        engine.ping_node(&ctx, test_node(2)).await.unwrap();
        clock.advance_ms(30_000);

        // Node 1 is past its timeout, node 2 pinged halfway
        assert_eq!(engine.lookup_nodes(&ctx).await.unwrap(), vec![test_node(2)]);
        assert!(engine.lookup_topics(&ctx).await.unwrap().is_empty());

        let evicted = engine.evict_expired().await.unwrap();
        assert_eq!(evicted, vec![test_node(1).key()]);

        // A fresh registration starts from scratch
        engine.register_node(&ctx, test_node(1)).await.unwrap();
        assert!(engine.lookup_topics(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_names_rejected() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        let err = engine
            .register_topic(&ctx, test_node(1), "")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { kind: "topic", .. }));

        let err = engine
            .register_channel(&ctx, test_node(1), "orders", "")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { kind: "channel", .. }));

        let err = engine
            .tombstone_topic(&ctx, test_node(1), "")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { kind: "topic", .. }));

        // Nothing was registered by the failed calls
        assert!(engine.lookup_nodes(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_any_non_empty_name_accepted() {
        let (engine, _) = test_engine();
        let ctx = Context::background();
        let long = "t".repeat(65);
        let names = ["orders:v2", "événements", "a b", "orders#ephemeral", long.as_str()];

        for name in names {
            engine
                .register_channel(&ctx, test_node(1), name, name)
                .await
                .unwrap();
            assert_eq!(
                engine.lookup_producers(&ctx, name).await.unwrap(),
                vec![test_node(1)]
            );
            assert_eq!(engine.lookup_channels(&ctx, name).await.unwrap(), vec![name]);
        }
        assert_eq!(engine.lookup_topics(&ctx).await.unwrap().len(), names.len());
    }

    #[tokio::test]
    async fn test_lookups_of_unknown_names_are_empty() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine
            .register_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();

        for name in ["", "a b", "missing"] {
            assert!(engine.lookup_producers(&ctx, name).await.unwrap().is_empty());
            assert!(engine.lookup_channels(&ctx, name).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_expired_node_reregisters_from_scratch() {
        let (engine, clock) = test_engine();
        let ctx = Context::background();

        engine
            .register_channel(&ctx, test_node(1), "orders", "billing")
            .await
            .unwrap();
        engine
            .tombstone_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();

        // Past the 60s timeout, before any sweep
        clock.advance_ms(61_000);
        engine.register_node(&ctx, test_node(1)).await.unwrap();

        assert_eq!(engine.lookup_nodes(&ctx).await.unwrap(), vec![test_node(1)]);
        assert!(engine.lookup_topics(&ctx).await.unwrap().is_empty());
        assert!(engine.lookup_channels(&ctx, "orders").await.unwrap().is_empty());

        // The old tombstone went with the node
        let state = engine.state.read().await;
        assert!(state.tombstones.is_empty());
    }

    #[tokio::test]
    async fn test_expired_node_ping_drops_stale_registrations() {
        let (engine, clock) = test_engine();
        let ctx = Context::background();

        engine
            .register_channel(&ctx, test_node(1), "orders", "billing")
            .await
            .unwrap();

        clock.advance_ms(61_000);
        engine.ping_node(&ctx, test_node(1)).await.unwrap();

        assert_eq!(engine.lookup_nodes(&ctx).await.unwrap(), vec![test_node(1)]);
        assert!(engine.lookup_topics(&ctx).await.unwrap().is_empty());
        assert!(engine
            .lookup_producers(&ctx, "orders")
            .await
            .unwrap()
            .is_empty());
        assert!(engine.evict_expired().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_node_unregister_channel_does_not_revive() {
        let (engine, clock) = test_engine();
        let ctx = Context::background();

        engine
            .register_channel(&ctx, test_node(1), "orders", "billing")
            .await
            .unwrap();
        engine
            .register_channel(&ctx, test_node(1), "orders", "audit")
            .await
            .unwrap();

        clock.advance_ms(61_000);
        engine
            .unregister_channel(&ctx, test_node(1), "orders", "audit")
            .await
            .unwrap();

        assert!(engine.lookup_nodes(&ctx).await.unwrap().is_empty());
        assert!(engine.lookup_channels(&ctx, "orders").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tombstone_refreshes_known_node() {
        let (engine, clock) = test_engine();
        let ctx = Context::background();

        engine
            .register_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();
        clock.advance_ms(50_000);
        engine
            .tombstone_topic(&ctx, test_node(1), "orders")
            .await
            .unwrap();
        clock.advance_ms(50_000);

        // Still live: the tombstone counted as activity
        assert_eq!(engine.lookup_nodes(&ctx).await.unwrap(), vec![test_node(1)]);
        assert_eq!(engine.lookup_topics(&ctx).await.unwrap(), vec!["orders"]);

        // Tombstoning an unknown node does not register it
        engine
            .tombstone_topic(&ctx, test_node(2), "orders")
            .await
            .unwrap();
        assert_eq!(engine.lookup_nodes(&ctx).await.unwrap(), vec![test_node(1)]);
    }

    #[tokio::test]
    async fn test_cancelled_context_leaves_state_untouched() {
        let (engine, _) = test_engine();
        let ctx = Context::background();
        let cancelled = Context::background();
        cancelled.cancel();

        let err = engine
            .register_node(&cancelled, test_node(1))
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::Cancelled(ContextError::Cancelled));
        assert!(engine.lookup_nodes(&ctx).await.unwrap().is_empty());

        let err = engine.lookup_topics(&cancelled).await.unwrap_err();
        assert_eq!(err, RegistryError::Cancelled(ContextError::Cancelled));
    }

    #[tokio::test]
    async fn test_close_fails_later_calls() {
        let (engine, _) = test_engine();
        let ctx = Context::background();

        engine.register_node(&ctx, test_node(1)).await.unwrap();
        engine.check_health(&ctx).await.unwrap();

        engine.close().await.unwrap();
        engine.close().await.unwrap();

        assert!(matches!(
            engine.check_health(&ctx).await,
            Err(RegistryError::Health { .. })
        ));
        assert_eq!(
            engine.lookup_nodes(&ctx).await.unwrap_err(),
            RegistryError::Closed
        );
        assert_eq!(
            engine.register_node(&ctx, test_node(1)).await.unwrap_err(),
            RegistryError::Closed
        );
        assert_eq!(engine.evict_expired().await.unwrap_err(), RegistryError::Closed);
    }

    #[tokio::test]
    async fn test_lookup_info() {
        let (engine, _) = test_engine();
        let info = engine.lookup_info(&Context::background()).await.unwrap();
        assert_eq!(info.engine_type, "memory");
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evictor_stops_on_cancel() {
        let clock = ManualClock::new(0);
        let config = MemoryEngineConfig::default()
            .with_node_timeout(Duration::from_secs(1))
            .with_eviction_interval(Duration::from_millis(100));
        let engine = Arc::new(MemoryEngine::with_clock(config, Arc::new(clock.clone())).unwrap());
        let ctx = Context::background();

        engine.register_node(&ctx, test_node(1)).await.unwrap();
        let stop = ctx.child();
        let handle = engine.spawn_evictor(stop.clone());

        clock.advance_ms(5_000);
        tokio::time::sleep(Duration::from_millis(250)).await;

        {
            let state = engine.state.read().await;
            assert!(state.nodes.is_empty());
            assert!(state.liveness.is_empty());
        }

        stop.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_evictor_stops_on_close() {
        let engine = Arc::new(MemoryEngine::new());
        let handle = engine.spawn_evictor(Context::background());

        engine.close().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        handle.await.unwrap();
    }
}
