//! Wires the full decorator stack — ConfigResolver -> ZoneAffinityResolver
//! -> AsyncResolver -> RetryableClient -> RedirectingClient ->
//! SessionedClient -> wire transport — against a stub transport, so the
//! composition can be exercised outside of tests.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

use disco_core::client::{Call, LegacyStatusEvaluator, RedirectingClientFactory, RetryableClient, RetryableClientConfig, SessionedClientFactory};
use disco_core::endpoint::{Endpoint, EndpointList};
use disco_core::error::ClientError;
use disco_core::resolver::{AsyncResolver, AsyncResolverConfig, ConfigResolver, Resolver, ZoneAffinityResolver};
use disco_core::transport::{DnsResolver, EurekaHttpResponse, HttpClient, HttpClientFactory};

struct StubWireClient {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpClient for StubWireClient {
    async fn register(&self, _: &[u8]) -> Result<EurekaHttpResponse, ClientError> {
        self.bump();
        Ok(EurekaHttpResponse::new(204))
    }
    async fn cancel(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.bump();
        Ok(EurekaHttpResponse::new(200))
    }
    async fn send_heartbeat(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.bump();
        Ok(EurekaHttpResponse::new(200))
    }
    async fn status_update(&self, _: &str, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.bump();
        Ok(EurekaHttpResponse::new(200))
    }
    async fn get_applications(&self) -> Result<EurekaHttpResponse, ClientError> {
        self.bump();
        Ok(EurekaHttpResponse::new(200).with_entity(b"<applications/>".to_vec()))
    }
    async fn get_delta(&self) -> Result<EurekaHttpResponse, ClientError> {
        self.bump();
        Ok(EurekaHttpResponse::new(200))
    }
    async fn get_vip(&self, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.bump();
        Ok(EurekaHttpResponse::new(200))
    }
    async fn get_by_id(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.bump();
        Ok(EurekaHttpResponse::new(200))
    }
    async fn shutdown(&self) {}
}

impl StubWireClient {
    fn bump(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct StubWireFactory {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpClientFactory for StubWireFactory {
    async fn create(&self, _endpoint: &Endpoint) -> Result<Box<dyn HttpClient>, ClientError> {
        Ok(Box::new(StubWireClient { calls: self.calls.clone() }))
    }
    async fn create_for_url(&self, _scheme: &str, _host: &str, _port: Option<u16>, _path: &str) -> Result<Box<dyn HttpClient>, ClientError> {
        Ok(Box::new(StubWireClient { calls: self.calls.clone() }))
    }
}

struct NoopDns;

#[async_trait]
impl DnsResolver for NoopDns {
    async fn resolve(&self, _host: &str) -> Result<IpAddr, ClientError> {
        Ok(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_resolver: Arc<dyn Resolver> = Arc::new(ConfigResolver::new(
        "us-east-1",
        vec![
            Endpoint::new("eureka-1.example.internal", 443, true, "us-east-1").with_zone("us-east-1a"),
            Endpoint::new("eureka-2.example.internal", 443, true, "us-east-1").with_zone("us-east-1c"),
        ],
    ));

    let zone_affine: Arc<dyn Resolver> = Arc::new(ZoneAffinityResolver::new(
        config_resolver,
        Some("us-east-1a".to_string()),
        Ipv4Addr::new(10, 0, 0, 42),
        true,
    ));

    let async_resolver = AsyncResolver::new(zone_affine, AsyncResolverConfig::default()).await?;
    let resolver: Arc<dyn Resolver> = Arc::new(async_resolver);

    let resolved: EndpointList = resolver.endpoints().await;
    println!("resolved {} candidate endpoint(s): {}", resolved.len(), resolved.iter().map(Endpoint::to_string).collect::<Vec<_>>().join(", "));

    let wire_calls = Arc::new(AtomicUsize::new(0));
    let wire_factory: Arc<dyn HttpClientFactory> = Arc::new(StubWireFactory { calls: wire_calls.clone() });
    let sessioned_factory: Arc<dyn HttpClientFactory> =
        Arc::new(SessionedClientFactory::new(wire_factory, Duration::from_secs(20 * 60)));
    let redirecting_factory: Arc<dyn HttpClientFactory> =
        Arc::new(RedirectingClientFactory::new(sessioned_factory, Arc::new(NoopDns)));

    let client = RetryableClient::new(
        resolver,
        redirecting_factory,
        Arc::new(LegacyStatusEvaluator),
        RetryableClientConfig::default(),
    );

    let response = client.execute(Call::GetApplications).await?;
    println!("GET /apps -> {} ({} bytes)", response.status_code, response.entity.map(|e| e.len()).unwrap_or(0));
    println!("underlying wire calls: {}", wire_calls.load(Ordering::SeqCst));

    Ok(())
}
