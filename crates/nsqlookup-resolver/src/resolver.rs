//! Resolver trait and the simple resolvers

use crate::error::ResolveResult;
use async_trait::async_trait;
use nsqlookup_core::Context;
use std::future::Future;
use std::sync::Arc;

/// Discovers the addresses of lookup servers
///
/// Implementations return immediately with the context's error when the
/// context is already done.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve the current list of `host:port` lookup addresses
    async fn resolve(&self, ctx: &Context) -> ResolveResult<Vec<String>>;
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    async fn resolve(&self, ctx: &Context) -> ResolveResult<Vec<String>> {
        (**self).resolve(ctx).await
    }
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for Box<R> {
    async fn resolve(&self, ctx: &Context) -> ResolveResult<Vec<String>> {
        (**self).resolve(ctx).await
    }
}

// =============================================================================
// StaticResolver
// =============================================================================

/// Always returns the same list of addresses
#[derive(Debug, Clone)]
pub struct StaticResolver {
    servers: Arc<[String]>,
}

impl StaticResolver {
    /// Create a resolver for a fixed list of addresses
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
        }
    }

    /// The configured addresses
    pub fn servers(&self) -> &[String] {
        &self.servers
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, ctx: &Context) -> ResolveResult<Vec<String>> {
        ctx.check()?;
        Ok(self.servers.to_vec())
    }
}

// =============================================================================
// ResolverFn
// =============================================================================

/// Adapts an async closure into a [`Resolver`]
///
/// ```ignore
/// let resolver = ResolverFn::new(|_ctx| async {
///     ResolveResult::Ok(vec!["10.0.0.1:4161".to_string()])
/// });
/// ```
#[derive(Clone)]
pub struct ResolverFn<F> {
    f: F,
}

impl<F> ResolverFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> std::fmt::Debug for ResolverFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Resolver for ResolverFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = ResolveResult<Vec<String>>> + Send + 'static,
{
    async fn resolve(&self, ctx: &Context) -> ResolveResult<Vec<String>> {
        ctx.check()?;
        (self.f)(ctx.clone()).await
    }
}
