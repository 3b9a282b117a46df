//! Consul-backed resolver
//!
//! Lists the instances of a service from the Consul catalog and keeps only
//! those whose node passes its health checks.
//!
//! Two read-only endpoints are queried concurrently:
//! - `v1/health/checks/{service}?passing`: nodes with passing checks
//! - `v1/catalog/service/{service}`: every registered instance
//!
//! A 404 from either endpoint means the service is unknown and yields an
//! empty list.

use crate::error::{ResolveError, ResolveResult};
use crate::resolver::Resolver;
use async_trait::async_trait;
use nsqlookup_core::constants::{
    CONSUL_ADDRESS_DEFAULT, CONSUL_REQUEST_TIMEOUT_MS_DEFAULT, CONSUL_REQUEST_TIMEOUT_MS_MAX,
    CONSUL_SERVICE_DEFAULT,
};
use nsqlookup_core::{Context, Error, HttpClient, HttpRequest, ReqwestHttpClient, Result};
use nsqlookup_registry::join_host_port;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = "nsqlookup consul resolver";

// =============================================================================
// Configuration
// =============================================================================

/// Where to find the Consul agent and which service to look up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsulConfig {
    /// Agent address; a missing scheme defaults to `http://`
    #[serde(default = "default_address")]
    pub address: String,

    /// Service name of the lookup servers
    #[serde(default = "default_service")]
    pub service: String,

    /// Upper bound for each catalog request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_address() -> String {
    CONSUL_ADDRESS_DEFAULT.to_string()
}

fn default_service() -> String {
    CONSUL_SERVICE_DEFAULT.to_string()
}

fn default_request_timeout_ms() -> u64 {
    CONSUL_REQUEST_TIMEOUT_MS_DEFAULT
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            service: default_service(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ConsulConfig {
    /// Set the agent address
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the service name
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(Error::invalid_configuration(
                "consul.request_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.request_timeout_ms > CONSUL_REQUEST_TIMEOUT_MS_MAX {
            return Err(Error::invalid_configuration(
                "consul.request_timeout_ms",
                format!(
                    "{} exceeds limit {}",
                    self.request_timeout_ms, CONSUL_REQUEST_TIMEOUT_MS_MAX
                ),
            ));
        }
        Ok(())
    }

    /// Agent base URL, with scheme and without trailing slash
    pub fn base_url(&self) -> String {
        let address = self.address.trim();
        let address = if address.is_empty() {
            CONSUL_ADDRESS_DEFAULT
        } else {
            address
        };

        let url = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        url.trim_end_matches('/').to_string()
    }

    /// Service name, falling back to the default when empty
    pub fn service_name(&self) -> &str {
        match self.service.trim() {
            "" => CONSUL_SERVICE_DEFAULT,
            service => service,
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// =============================================================================
// Catalog payloads
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthCheck {
    node: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogEntry {
    node: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    service_address: String,
    service_port: u16,
}

impl CatalogEntry {
    fn endpoint(&self) -> String {
        let host = if self.service_address.is_empty() {
            &self.address
        } else {
            &self.service_address
        };
        join_host_port(host, self.service_port)
    }
}

// =============================================================================
// ConsulResolver
// =============================================================================

/// Resolves lookup servers from a Consul agent
pub struct ConsulResolver {
    config: ConsulConfig,
    client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for ConsulResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsulResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConsulResolver {
    /// Create a resolver talking to Consul over reqwest
    pub fn new(config: ConsulConfig) -> Self {
        Self::with_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    /// Create a resolver with a custom transport
    pub fn with_client(config: ConsulConfig, client: Arc<dyn HttpClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ConsulConfig {
        &self.config
    }

    /// GET `endpoint` from the agent and decode a JSON array
    ///
    /// A 404 decodes as an empty array.
    async fn get_list<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        base_url: &str,
        endpoint: &str,
    ) -> ResolveResult<Vec<T>> {
        let timeout = match ctx.remaining() {
            Some(remaining) => remaining.min(self.config.request_timeout()),
            None => self.config.request_timeout(),
        };

        let request = HttpRequest::get(format!("{}/{}", base_url, endpoint))
            .with_header("User-Agent", USER_AGENT)
            .with_header("Accept", "application/json")
            .with_timeout(timeout);

        let response = ctx.run(self.client.execute(request)).await??;

        match response.status {
            200 => serde_json::from_str(&response.body)
                .map_err(|e| ResolveError::decode(endpoint, e.to_string())),
            404 => {
                debug!(endpoint, "Service not known to consul");
                Ok(Vec::new())
            }
            status => {
                warn!(endpoint, status, "Unexpected consul response");
                Err(ResolveError::CatalogStatus {
                    endpoint: endpoint.to_string(),
                    address: base_url.to_string(),
                    status,
                    reason: response.reason().to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl Resolver for ConsulResolver {
    #[instrument(skip(self, ctx), fields(service = %self.config.service_name()))]
    async fn resolve(&self, ctx: &Context) -> ResolveResult<Vec<String>> {
        ctx.check()?;

        let base_url = self.config.base_url();
        let service = self.config.service_name();
        let checks_endpoint = format!("v1/health/checks/{}?passing", service);
        let catalog_endpoint = format!("v1/catalog/service/{}", service);

        let (checks, catalog) = tokio::try_join!(
            self.get_list::<HealthCheck>(ctx, &base_url, &checks_endpoint),
            self.get_list::<CatalogEntry>(ctx, &base_url, &catalog_endpoint),
        )?;

        let passing: HashSet<&str> = checks.iter().map(|check| check.node.as_str()).collect();
        let servers: Vec<String> = catalog
            .iter()
            .filter(|entry| passing.contains(entry.node.as_str()))
            .map(CatalogEntry::endpoint)
            .collect();

        debug!(
            passing = passing.len(),
            registered = catalog.len(),
            resolved = servers.len(),
            "Resolved servers from consul"
        );
        Ok(servers)
    }
}
