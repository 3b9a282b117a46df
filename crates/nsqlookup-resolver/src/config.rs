//! Declarative resolver chains
//!
//! A [`ResolverConfig`] describes where lookup servers come from and is
//! usually read from the `[resolver]` table of a service's TOML file:
//!
//! ```toml
//! cache_ttl_ms = 5000
//!
//! [source]
//! kind = "multi"
//!
//! [[source.children]]
//! kind = "static"
//! servers = ["10.0.0.1:4161"]
//!
//! [[source.children]]
//! kind = "consul"
//! address = "consul.service:8500"
//! ```

use crate::cached::CachedResolver;
use crate::consul::{ConsulConfig, ConsulResolver};
use crate::multi::MultiResolver;
use crate::resolver::{Resolver, StaticResolver};
use nsqlookup_core::constants::{
    RESOLVER_CACHE_TTL_MS_MAX, RESOLVER_CHILDREN_COUNT_MAX, RESOLVER_NESTING_DEPTH_MAX,
};
use nsqlookup_core::{Error, HttpClient, ReqwestHttpClient, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Top-level resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Wrap the source in a cache with this TTL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_ms: Option<u64>,

    /// Where addresses come from
    pub source: SourceConfig,
}

/// One source of lookup addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A fixed list of `host:port` addresses
    Static { servers: Vec<String> },
    /// Healthy instances of a Consul service
    Consul(ConsulConfig),
    /// Union of several sources queried concurrently
    Multi { children: Vec<SourceConfig> },
}

impl ResolverConfig {
    /// Config for a source without caching
    pub fn new(source: SourceConfig) -> Self {
        Self {
            cache_ttl_ms: None,
            source,
        }
    }

    /// Cache resolved addresses for `ttl`
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = Some(ttl.as_millis() as u64);
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| Error::invalid_configuration("resolver", e.message()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(ttl_ms) = self.cache_ttl_ms {
            if ttl_ms == 0 {
                return Err(Error::invalid_configuration(
                    "resolver.cache_ttl_ms",
                    "must be greater than 0",
                ));
            }
            if ttl_ms > RESOLVER_CACHE_TTL_MS_MAX {
                return Err(Error::invalid_configuration(
                    "resolver.cache_ttl_ms",
                    format!("{} exceeds limit {}", ttl_ms, RESOLVER_CACHE_TTL_MS_MAX),
                ));
            }
        }

        self.source.validate("resolver.source", 1)
    }

    /// Build the resolver chain, sharing one reqwest client between Consul sources
    pub fn build(&self) -> Result<Arc<dyn Resolver>> {
        self.build_with_transport(Arc::new(ReqwestHttpClient::new()))
    }

    /// Build the resolver chain on a custom HTTP transport
    pub fn build_with_transport(&self, transport: Arc<dyn HttpClient>) -> Result<Arc<dyn Resolver>> {
        self.validate()?;

        let source = self.source.build(&transport);
        let resolver: Arc<dyn Resolver> = match self.cache_ttl_ms {
            Some(ttl_ms) => Arc::new(CachedResolver::new(source, Duration::from_millis(ttl_ms))),
            None => source,
        };
        Ok(resolver)
    }
}

impl SourceConfig {
    fn validate(&self, field: &str, depth: usize) -> Result<()> {
        if depth > RESOLVER_NESTING_DEPTH_MAX {
            return Err(Error::invalid_configuration(
                field,
                format!("nesting depth exceeds limit {}", RESOLVER_NESTING_DEPTH_MAX),
            ));
        }

        match self {
            Self::Static { servers } => {
                if servers.is_empty() {
                    return Err(Error::invalid_configuration(
                        format!("{}.servers", field),
                        "must list at least one address",
                    ));
                }
                if let Some(blank) = servers.iter().position(|s| s.trim().is_empty()) {
                    return Err(Error::invalid_configuration(
                        format!("{}.servers[{}]", field, blank),
                        "must not be empty",
                    ));
                }
                Ok(())
            }
            Self::Consul(consul) => consul.validate(),
            Self::Multi { children } => {
                if children.len() > RESOLVER_CHILDREN_COUNT_MAX {
                    return Err(Error::invalid_configuration(
                        format!("{}.children", field),
                        format!(
                            "{} children exceeds limit {}",
                            children.len(),
                            RESOLVER_CHILDREN_COUNT_MAX
                        ),
                    ));
                }
                children.iter().enumerate().try_for_each(|(i, child)| {
                    child.validate(&format!("{}.children[{}]", field, i), depth + 1)
                })
            }
        }
    }

    fn build(&self, transport: &Arc<dyn HttpClient>) -> Arc<dyn Resolver> {
        match self {
            Self::Static { servers } => Arc::new(StaticResolver::new(servers.iter().cloned())),
            Self::Consul(consul) => {
                Arc::new(ConsulResolver::with_client(consul.clone(), Arc::clone(transport)))
            }
            Self::Multi { children } => Arc::new(MultiResolver::new(
                children.iter().map(|child| child.build(transport)).collect(),
            )),
        }
    }
}
