//! nsqlookup Resolver
//!
//! Discovery of lookup-server addresses for clients and brokers.
//!
//! # Overview
//!
//! - [`Resolver`]: the discovery contract, implemented for `Arc<R>` and `Box<R>`
//! - [`StaticResolver`] and [`ResolverFn`]: fixed lists and closures
//! - [`CachedResolver`]: TTL cache that never stores a cancellation
//! - [`ConsulResolver`]: healthy instances of a Consul service
//! - [`MultiResolver`]: concurrent fan-out with partial-success semantics
//! - [`ResolverConfig`]: serde description of a resolver chain
//!
//! # Example
//!
//! ```ignore
//! use nsqlookup_core::Context;
//! use nsqlookup_resolver::{CachedResolver, ConsulConfig, ConsulResolver, Resolver};
//! use std::time::Duration;
//!
//! let resolver = CachedResolver::new(
//!     ConsulResolver::new(ConsulConfig::default()),
//!     Duration::from_secs(5),
//! );
//! let servers = resolver.resolve(&Context::background()).await?;
//! ```

mod cached;
mod config;
mod consul;
mod error;
mod multi;
mod resolver;

pub use cached::CachedResolver;
pub use config::{ResolverConfig, SourceConfig};
pub use consul::{ConsulConfig, ConsulResolver};
pub use error::{ResolveError, ResolveResult};
pub use multi::MultiResolver;
pub use resolver::{Resolver, ResolverFn, StaticResolver};
