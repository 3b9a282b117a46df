//! Resolver chain tests against a mock Consul agent
//!
//! Runs real reqwest traffic against a mockito server, through the
//! same chains a service would build from its configuration.

use mockito::{Matcher, Server, ServerGuard};
use nsqlookup_core::Context;
use nsqlookup_resolver::{
    CachedResolver, ConsulConfig, ConsulResolver, MultiResolver, ResolveError, Resolver,
    ResolverConfig, StaticResolver,
};
use std::sync::Arc;
use std::time::Duration;

const CHECKS_PATH: &str = "/v1/health/checks/nsqlookupd";
const CATALOG_PATH: &str = "/v1/catalog/service/nsqlookupd";

const CATALOG_BODY: &str = r#"[
    {"Node":"n1","Address":"10.0.0.1","ServiceAddress":"","ServicePort":4161},
    {"Node":"n2","Address":"10.0.0.2","ServiceAddress":"192.168.0.2","ServicePort":4161},
    {"Node":"n3","Address":"10.0.0.3","ServiceAddress":"","ServicePort":4161}
]"#;

async fn mock_checks(server: &mut ServerGuard, status: usize, body: &str) -> mockito::Mock {
    server
        .mock("GET", CHECKS_PATH)
        .match_query(Matcher::Regex("passing".into()))
        .match_header("user-agent", "nsqlookup consul resolver")
        .match_header("accept", "application/json")
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

async fn mock_catalog(server: &mut ServerGuard, status: usize, body: &str) -> mockito::Mock {
    server
        .mock("GET", CATALOG_PATH)
        .match_header("user-agent", "nsqlookup consul resolver")
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

fn consul(server: &ServerGuard) -> ConsulResolver {
    ConsulResolver::new(ConsulConfig::default().with_address(server.url()))
}

#[tokio::test]
async fn test_consul_returns_passing_instances() {
    let mut server = Server::new_async().await;
    let checks = mock_checks(&mut server, 200, r#"[{"Node":"n1"},{"Node":"n2"}]"#).await;
    let catalog = mock_catalog(&mut server, 200, CATALOG_BODY).await;

    let servers = consul(&server)
        .resolve(&Context::background())
        .await
        .unwrap();

    assert_eq!(servers, vec!["10.0.0.1:4161", "192.168.0.2:4161"]);
    checks.assert_async().await;
    catalog.assert_async().await;
}

#[tokio::test]
async fn test_consul_unknown_service_is_empty() {
    let mut server = Server::new_async().await;
    mock_checks(&mut server, 404, "").await;
    mock_catalog(&mut server, 404, "").await;

    let servers = consul(&server)
        .resolve(&Context::background())
        .await
        .unwrap();
    assert!(servers.is_empty());
}

#[tokio::test]
async fn test_consul_server_error() {
    let mut server = Server::new_async().await;
    mock_checks(&mut server, 200, "[]").await;
    mock_catalog(&mut server, 500, "agent overloaded").await;

    let err = consul(&server)
        .resolve(&Context::background())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::CatalogStatus { status: 500, .. }));
    let message = err.to_string();
    assert!(message.contains("v1/catalog/service/nsqlookupd"));
    assert!(message.contains(&server.url()));
}

#[tokio::test]
async fn test_consul_unreachable_agent() {
    // Nothing listens on the discard port
    let resolver = ConsulResolver::new(
        ConsulConfig::default()
            .with_address("127.0.0.1:9")
            .with_request_timeout(Duration::from_secs(2)),
    );

    let err = resolver.resolve(&Context::background()).await.unwrap_err();
    assert!(matches!(err, ResolveError::Transport(_)));
}

#[tokio::test]
async fn test_cached_consul_hits_agent_once() {
    let mut server = Server::new_async().await;
    let checks = server
        .mock("GET", CHECKS_PATH)
        .match_query(Matcher::Regex("passing".into()))
        .with_status(200)
        .with_body(r#"[{"Node":"n3"}]"#)
        .expect(1)
        .create_async()
        .await;
    let catalog = server
        .mock("GET", CATALOG_PATH)
        .with_status(200)
        .with_body(CATALOG_BODY)
        .expect(1)
        .create_async()
        .await;

    let resolver = CachedResolver::new(consul(&server), Duration::from_secs(60));
    let ctx = Context::background();

    for _ in 0..3 {
        assert_eq!(resolver.resolve(&ctx).await.unwrap(), vec!["10.0.0.3:4161"]);
    }

    checks.assert_async().await;
    catalog.assert_async().await;
}

#[tokio::test]
async fn test_multi_survives_failing_agent() {
    let mut server = Server::new_async().await;
    mock_checks(&mut server, 503, "").await;
    mock_catalog(&mut server, 200, CATALOG_BODY).await;

    let children: Vec<Arc<dyn Resolver>> = vec![
        Arc::new(consul(&server)),
        Arc::new(StaticResolver::new(["10.1.0.1:4161"])),
    ];
    let resolver = MultiResolver::new(children);

    let servers = resolver.resolve(&Context::background()).await.unwrap();
    assert_eq!(servers, vec!["10.1.0.1:4161"]);
}

#[tokio::test]
async fn test_chain_built_from_toml() {
    let mut server = Server::new_async().await;
    mock_checks(&mut server, 200, r#"[{"Node":"n1"}]"#).await;
    mock_catalog(&mut server, 200, CATALOG_BODY).await;

    let toml = format!(
        r#"
        cache_ttl_ms = 1000

        [source]
        kind = "multi"

        [[source.children]]
        kind = "static"
        servers = ["10.1.0.1:4161"]

        [[source.children]]
        kind = "consul"
        address = "{}"
        "#,
        server.url()
    );

    let resolver = ResolverConfig::from_toml_str(&toml).unwrap().build().unwrap();
    let mut servers = resolver.resolve(&Context::background()).await.unwrap();
    servers.sort();

    assert_eq!(servers, vec!["10.0.0.1:4161", "10.1.0.1:4161"]);
}
