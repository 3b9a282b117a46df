//! Fan-out across several resolvers

use crate::error::{ResolveError, ResolveResult};
use crate::resolver::Resolver;
use async_trait::async_trait;
use nsqlookup_core::Context;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

/// Queries every child concurrently and merges their addresses
///
/// Succeeds as soon as at least one child returned addresses; the failures
/// of the others are then dropped. When nothing was found and some child
/// failed, every failure is reported in [`ResolveError::Aggregate`].
/// Addresses are appended in completion order and are not deduplicated.
#[derive(Clone, Default)]
pub struct MultiResolver {
    children: Vec<Arc<dyn Resolver>>,
}

impl std::fmt::Debug for MultiResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiResolver")
            .field("children", &self.children.len())
            .finish()
    }
}

impl MultiResolver {
    pub fn new(children: Vec<Arc<dyn Resolver>>) -> Self {
        Self { children }
    }

    /// Add a child resolver
    pub fn with_child(mut self, child: Arc<dyn Resolver>) -> Self {
        self.children.push(child);
        self
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[async_trait]
impl Resolver for MultiResolver {
    #[instrument(skip(self, ctx), fields(children = self.children.len()))]
    async fn resolve(&self, ctx: &Context) -> ResolveResult<Vec<String>> {
        ctx.check()?;

        let mut tasks = match self.children.as_slice() {
            [] => return Ok(Vec::new()),
            [only] => return only.resolve(ctx).await,
            children => {
                let mut tasks = JoinSet::new();
                for child in children {
                    let child = Arc::clone(child);
                    let ctx = ctx.clone();
                    tasks.spawn(async move { child.resolve(&ctx).await });
                }
                tasks
            }
        };

        let mut servers = Vec::new();
        let mut errors = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(found)) => servers.extend(found),
                Ok(Err(err)) => {
                    warn!(error = %err, "Child resolver failed");
                    errors.push(err);
                }
                Err(join_err) => {
                    warn!(error = %join_err, "Child resolver task failed");
                    errors.push(ResolveError::Join {
                        reason: join_err.to_string(),
                    });
                }
            }
        }

        if servers.is_empty() && !errors.is_empty() {
            return Err(ResolveError::Aggregate(errors));
        }

        debug!(
            resolved = servers.len(),
            failed = errors.len(),
            "Merged child resolvers"
        );
        Ok(servers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ResolverFn, StaticResolver};
    use nsqlookup_core::ContextError;
    use std::collections::HashSet;
    use std::time::Duration;

    fn failing(reason: &'static str) -> Arc<dyn Resolver> {
        Arc::new(ResolverFn::new(move |_ctx: Context| async move {
            ResolveResult::<Vec<String>>::Err(ResolveError::decode(
                "v1/catalog/service/nsqlookupd",
                reason,
            ))
        }))
    }

    fn fixed(servers: &[&str]) -> Arc<dyn Resolver> {
        Arc::new(StaticResolver::new(servers.iter().copied()))
    }

    #[tokio::test]
    async fn test_partial_success_suppresses_errors() {
        let resolver = MultiResolver::new(vec![fixed(&["x"]), failing("eof"), fixed(&["y"])]);

        let servers = resolver.resolve(&Context::background()).await.unwrap();
        let set: HashSet<_> = servers.into_iter().collect();
        assert_eq!(set, HashSet::from(["x".to_string(), "y".to_string()]));
    }

    #[tokio::test]
    async fn test_all_failures_are_aggregated() {
        let resolver = MultiResolver::new(vec![failing("a"), failing("b"), failing("c")]);

        let err = resolver.resolve(&Context::background()).await.unwrap_err();
        match err {
            ResolveError::Aggregate(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_results_without_errors() {
        let ctx = Context::background();

        assert!(MultiResolver::default().resolve(&ctx).await.unwrap().is_empty());

        let resolver = MultiResolver::new(vec![fixed(&[]), fixed(&[])]);
        assert!(resolver.resolve(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_child_is_delegated() {
        let resolver = MultiResolver::default().with_child(failing("only"));

        let err = resolver.resolve(&Context::background()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_panicking_child_counts_as_failure() {
        let panicking: Arc<dyn Resolver> = Arc::new(ResolverFn::new(|_ctx: Context| async {
            if true {
                panic!("resolver exploded");
            }
            ResolveResult::Ok(Vec::<String>::new())
        }));

        let resolver = MultiResolver::new(vec![panicking.clone(), failing("eof")]);
        let err = resolver.resolve(&Context::background()).await.unwrap_err();
        match err {
            ResolveError::Aggregate(errors) => {
                assert!(errors.iter().any(|e| matches!(e, ResolveError::Join { .. })));
            }
            other => panic!("unexpected error: {other}"),
        }

        let resolver = MultiResolver::new(vec![panicking, fixed(&["x"])]);
        assert_eq!(
            resolver.resolve(&Context::background()).await.unwrap(),
            vec!["x"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reaches_children() {
        let slow: Arc<dyn Resolver> = Arc::new(ResolverFn::new(|ctx: Context| async move {
            ctx.run(tokio::time::sleep(Duration::from_secs(60))).await?;
            ResolveResult::Ok(vec!["late".to_string()])
        }));

        let resolver = MultiResolver::new(vec![slow.clone(), slow]);
        let ctx = Context::background().with_timeout(Duration::from_secs(1));

        let err = resolver.resolve(&ctx).await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(matches!(
            err,
            ResolveError::Aggregate(ref errors)
                if errors.iter().all(|e| *e == ResolveError::Cancelled(ContextError::DeadlineExceeded))
        ));
    }
}
