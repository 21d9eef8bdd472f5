//! Client-side decorator stack scenarios, exercised
//! against the public API only.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use disco_core::client::{Call, LegacyStatusEvaluator, RedirectingClient, RetryableClient, RetryableClientConfig, SessionedClient};
use disco_core::endpoint::{Endpoint, EndpointList};
use disco_core::error::ClientError;
use disco_core::resolver::Resolver;
use disco_core::transport::{DnsResolver, EurekaHttpResponse, HttpClient, HttpClientFactory};

struct FixedResolver(Vec<Endpoint>);

#[async_trait]
impl Resolver for FixedResolver {
    fn region(&self) -> String {
        "us-east-1".to_string()
    }
    async fn endpoints(&self) -> EndpointList {
        EndpointList::new(self.0.clone())
    }
}

struct ScriptedClient {
    script: Mutex<std::collections::VecDeque<Result<u16, ()>>>,
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn register(&self, _: &[u8]) -> Result<EurekaHttpResponse, ClientError> {
        self.next()
    }
    async fn cancel(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.next()
    }
    async fn send_heartbeat(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.next()
    }
    async fn status_update(&self, _: &str, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.next()
    }
    async fn get_applications(&self) -> Result<EurekaHttpResponse, ClientError> {
        self.next()
    }
    async fn get_delta(&self) -> Result<EurekaHttpResponse, ClientError> {
        self.next()
    }
    async fn get_vip(&self, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.next()
    }
    async fn get_by_id(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.next()
    }
    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScriptedClient {
    fn next(&self) -> Result<EurekaHttpResponse, ClientError> {
        match self.script.lock().pop_front().unwrap_or(Err(())) {
            Ok(code) => Ok(EurekaHttpResponse::new(code)),
            Err(()) => Err(ClientError::Transport("boom".into())),
        }
    }
}

struct ScriptedFactory {
    scripts: Mutex<std::collections::VecDeque<Vec<Result<u16, ()>>>>,
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpClientFactory for ScriptedFactory {
    async fn create(&self, _endpoint: &Endpoint) -> Result<Box<dyn HttpClient>, ClientError> {
        let script = self.scripts.lock().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedClient { script: Mutex::new(script.into_iter().collect()), shutdowns: self.shutdowns.clone() }))
    }
    async fn create_for_url(&self, _: &str, _: &str, _: Option<u16>, _: &str) -> Result<Box<dyn HttpClient>, ClientError> {
        self.create(&Endpoint::new("unused", 80, false, "")).await
    }
}

fn ep(host: &str) -> Endpoint {
    Endpoint::new(host, 80, false, "us-east-1")
}

#[tokio::test]
async fn s1_retry_then_succeed() {
    let resolver = Arc::new(FixedResolver(vec![ep("a"), ep("b"), ep("c")]));
    let shutdowns = Arc::new(AtomicUsize::new(0));
    let factory = Arc::new(ScriptedFactory {
        scripts: Mutex::new(std::collections::VecDeque::from(vec![vec![Err(())], vec![Ok(503)], vec![Ok(200)]])),
        shutdowns: shutdowns.clone(),
    });
    let client = RetryableClient::new(resolver, factory, Arc::new(LegacyStatusEvaluator), RetryableClientConfig::default());

    let response = client.execute(Call::GetApplications).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(client.quarantine_size(), 2);
}

#[tokio::test]
async fn s2_quarantine_self_purges_past_threshold() {
    let resolver = Arc::new(FixedResolver(vec![ep("a"), ep("b"), ep("c")]));
    let shutdowns = Arc::new(AtomicUsize::new(0));
    let factory = Arc::new(ScriptedFactory {
        scripts: Mutex::new(std::collections::VecDeque::from(vec![
            vec![Err(())],
            vec![Err(())],
            vec![Ok(200)],
            vec![Ok(200)],
        ])),
        shutdowns,
    });
    let client = RetryableClient::new(resolver, factory, Arc::new(LegacyStatusEvaluator), RetryableClientConfig { max_attempts: 3, quarantine_refresh_fraction: 0.66 });

    client.execute(Call::GetApplications).await.unwrap();
    // a and b are now quarantined out of 3 candidates (2/3 = 0.667 >= 0.66),
    // so the next call must observe the purge and be free to reuse "a" again.
    assert_eq!(client.quarantine_size(), 0);
}

struct StubDns;

#[async_trait]
impl DnsResolver for StubDns {
    async fn resolve(&self, _host: &str) -> Result<IpAddr, ClientError> {
        Ok(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)))
    }
}

struct RedirectThenTerminalFactory {
    redirected: AtomicUsize,
    shutdowns: Arc<AtomicUsize>,
}

struct RedirectingStub {
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpClient for RedirectingStub {
    async fn register(&self, _: &[u8]) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn cancel(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn send_heartbeat(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn status_update(&self, _: &str, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn get_applications(&self) -> Result<EurekaHttpResponse, ClientError> {
        Ok(EurekaHttpResponse::new(302).with_location("https://eureka-lb/v2/apps"))
    }
    async fn get_delta(&self) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn get_vip(&self, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn get_by_id(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

struct TerminalStub {
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpClient for TerminalStub {
    async fn register(&self, _: &[u8]) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn cancel(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn send_heartbeat(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn status_update(&self, _: &str, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn get_applications(&self) -> Result<EurekaHttpResponse, ClientError> {
        Ok(EurekaHttpResponse::new(200))
    }
    async fn get_delta(&self) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn get_vip(&self, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn get_by_id(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        unimplemented!()
    }
    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpClientFactory for RedirectThenTerminalFactory {
    async fn create(&self, _endpoint: &Endpoint) -> Result<Box<dyn HttpClient>, ClientError> {
        Ok(Box::new(RedirectingStub { shutdowns: self.shutdowns.clone() }))
    }
    async fn create_for_url(&self, _: &str, _: &str, _: Option<u16>, _: &str) -> Result<Box<dyn HttpClient>, ClientError> {
        self.redirected.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TerminalStub { shutdowns: self.shutdowns.clone() }))
    }
}

#[tokio::test]
async fn s3_redirect_chain_pins_terminal_ip() {
    let shutdowns = Arc::new(AtomicUsize::new(0));
    let factory = Arc::new(RedirectThenTerminalFactory { redirected: AtomicUsize::new(0), shutdowns });
    let dns = Arc::new(StubDns);
    let redirecting = RedirectingClient::new(factory.clone(), dns, Endpoint::new("eureka-lb", 443, true, "us-east-1").with_path_prefix("/v2/"));

    let response = redirecting.execute(Call::GetApplications).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(factory.redirected.load(Ordering::SeqCst), 1);
}

struct AlwaysOkFactory;

#[async_trait]
impl HttpClientFactory for AlwaysOkFactory {
    async fn create(&self, _endpoint: &Endpoint) -> Result<Box<dyn HttpClient>, ClientError> {
        Ok(Box::new(ScriptedClient { script: Mutex::new(vec![Ok(200)].into_iter().collect()), shutdowns: Arc::new(AtomicUsize::new(0)) }))
    }
    async fn create_for_url(&self, _: &str, _: &str, _: Option<u16>, _: &str) -> Result<Box<dyn HttpClient>, ClientError> {
        unreachable!("SessionedClient never calls create_for_url")
    }
}

#[tokio::test]
async fn s4_session_rollover_constructs_a_fresh_client_after_expiry() {
    let factory = Arc::new(AlwaysOkFactory);
    let client = SessionedClient::new(factory, Endpoint::new("h", 80, false, "us-east-1"), Duration::from_millis(1));

    let first = client.execute(Call::GetApplications).await.unwrap();
    assert_eq!(first.status_code, 200);
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = client.execute(Call::GetApplications).await.unwrap();
    assert_eq!(second.status_code, 200);
}
