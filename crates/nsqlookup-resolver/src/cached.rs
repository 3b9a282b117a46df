//! TTL cache in front of another resolver
//!
//! Successes and failures are both cached for the TTL so a struggling
//! catalog is not hammered by every caller. A call that only failed because
//! its context finished is never cached: the cache is cleared instead, so
//! the next caller with a live context goes upstream.

use crate::error::{ResolveError, ResolveResult};
use crate::resolver::Resolver;
use async_trait::async_trait;
use nsqlookup_core::{Context, TimeProvider, WallClockTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Last upstream outcome and when it stops being served
#[derive(Debug, Default)]
struct CacheEntry {
    servers: Vec<String>,
    error: Option<ResolveError>,
    expires_at_ms: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }

    fn snapshot(&self) -> ResolveResult<Vec<String>> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.servers.clone()),
        }
    }

    fn store(&mut self, result: &ResolveResult<Vec<String>>, expires_at_ms: u64) {
        match result {
            Ok(servers) => {
                self.servers = servers.clone();
                self.error = None;
            }
            Err(err) => {
                self.servers = Vec::new();
                self.error = Some(err.clone());
            }
        }
        self.expires_at_ms = expires_at_ms;
    }
}

/// Caches the outcome of another resolver for a fixed TTL
pub struct CachedResolver<R> {
    inner: R,
    ttl_ms: u64,
    time: Arc<dyn TimeProvider>,
    cache: RwLock<CacheEntry>,
}

impl<R> std::fmt::Debug for CachedResolver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedResolver")
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}

impl<R: Resolver> CachedResolver<R> {
    /// Cache `inner` for `ttl` using the wall clock
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self::with_clock(inner, ttl, Arc::new(WallClockTime::new()))
    }

    /// Cache `inner` for `ttl` using the given time source
    pub fn with_clock(inner: R, ttl: Duration, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            inner,
            ttl_ms: ttl.as_millis() as u64,
            time,
            cache: RwLock::new(CacheEntry::default()),
        }
    }

    /// Cache lifetime
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Drop the cached outcome so the next call goes upstream
    pub async fn invalidate(&self) {
        *self.cache.write().await = CacheEntry::default();
    }
}

#[async_trait]
impl<R: Resolver> Resolver for CachedResolver<R> {
    #[instrument(skip(self, ctx), fields(ttl_ms = self.ttl_ms))]
    async fn resolve(&self, ctx: &Context) -> ResolveResult<Vec<String>> {
        ctx.check()?;

        {
            let cache = ctx.run(self.cache.read()).await?;
            if cache.is_fresh(self.time.now_ms()) {
                debug!("Cache hit");
                return cache.snapshot();
            }
        }

        let mut cache = ctx.run(self.cache.write()).await?;

        // Another caller may have refreshed the entry while we waited
        let now_ms = self.time.now_ms();
        if cache.is_fresh(now_ms) {
            debug!("Cache refreshed by concurrent caller");
            return cache.snapshot();
        }

        debug!("Cache miss");
        let result = self.inner.resolve(ctx).await;

        match &result {
            Err(err) if err.is_cancellation() => {
                debug!(error = %err, "Upstream call cancelled, clearing cache");
                *cache = CacheEntry::default();
            }
            _ => cache.store(&result, now_ms.saturating_add(self.ttl_ms)),
        }

        result
    }
}
