//! Server-side cache and peer-set scenarios, exercised
//! against the public API only.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use disco_core::cache::{AcceptLevel, CacheKey, EntityKind, PayloadSource, ResponseCache, ResponseCacheConfig, ALL_APPS};
use disco_core::endpoint::{Endpoint, EndpointList};
use disco_core::error::{CacheError, ClientError, PeerError};
use disco_core::peers::{LocalNodeMatch, PeerNode, PeerNodeFactory, PeerNodeSet};
use disco_core::resolver::Resolver;
use disco_core::transport::{EurekaHttpResponse, HttpClient};

struct CountingSource {
    calls: AtomicUsize,
    payload: Vec<u8>,
}

#[async_trait]
impl PayloadSource for CountingSource {
    async fn generate(&self, _key: &CacheKey) -> Result<Vec<u8>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

#[tokio::test]
async fn s5_cache_reconcile_backfills_read_only_after_write_through_eviction() {
    let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), payload: b"snapshot-v1".to_vec() });
    let cache = ResponseCache::new(source.clone(), ResponseCacheConfig::default());
    let key = CacheKey::new(EntityKind::Application, ALL_APPS, "json", "v2", AcceptLevel::Full);

    let initial = cache.get(&key, true).await;
    assert_eq!(initial.payload(), b"snapshot-v1");
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    // Invalidate only the write-through tier; ReadOnly keeps serving the
    // stale snapshot until the reconciler's next pass.
    cache.invalidate(ALL_APPS, None, None);
    let still_stale = cache.get(&key, true).await;
    assert_eq!(still_stale.payload(), b"snapshot-v1");
}

#[tokio::test]
async fn s5_cache_serves_regioned_keys_independently_of_their_regionless_sibling() {
    let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), payload: b"app-payload".to_vec() });
    let cache = ResponseCache::new(source.clone(), ResponseCacheConfig::default());

    let regionless = CacheKey::new(EntityKind::Application, "APP-X", "json", "v2", AcceptLevel::Full);
    let regioned = regionless.clone().with_regions(vec!["us-east-1".into()]);

    cache.get(&regionless, false).await;
    cache.get(&regioned, false).await;
    assert_eq!(cache.current_size(), 2);
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    // Invalidating the application evicts both the regionless entry and
    // its region-specific sibling in one pass.
    cache.invalidate("APP-X", None, None);
    assert_eq!(cache.current_size(), 0);
}

struct NoopClient {
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpClient for NoopClient {
    async fn register(&self, _: &[u8]) -> Result<EurekaHttpResponse, ClientError> {
        Ok(EurekaHttpResponse::new(200))
    }
    async fn cancel(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        Ok(EurekaHttpResponse::new(200))
    }
    async fn send_heartbeat(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        Ok(EurekaHttpResponse::new(200))
    }
    async fn status_update(&self, _: &str, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        Ok(EurekaHttpResponse::new(200))
    }
    async fn get_applications(&self) -> Result<EurekaHttpResponse, ClientError> {
        Ok(EurekaHttpResponse::new(200))
    }
    async fn get_delta(&self) -> Result<EurekaHttpResponse, ClientError> {
        Ok(EurekaHttpResponse::new(200))
    }
    async fn get_vip(&self, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        Ok(EurekaHttpResponse::new(200))
    }
    async fn get_by_id(&self, _: &str, _: &str) -> Result<EurekaHttpResponse, ClientError> {
        Ok(EurekaHttpResponse::new(200))
    }
    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

struct CountingFactory {
    shutdowns: Arc<AtomicUsize>,
    fail_for: Vec<String>,
}

#[async_trait]
impl PeerNodeFactory for CountingFactory {
    async fn create(&self, endpoint: &Endpoint) -> Result<PeerNode, PeerError> {
        let url = endpoint.serialized_url();
        if self.fail_for.contains(&url) {
            return Err(PeerError::ConstructionFailed { url: url.clone(), reason: "scripted failure".into() });
        }
        Ok(PeerNode::new(url, Box::new(NoopClient { shutdowns: self.shutdowns.clone() })))
    }
}

struct SwappableResolver(parking_lot::Mutex<Vec<Endpoint>>);

#[async_trait]
impl Resolver for SwappableResolver {
    fn region(&self) -> String {
        "us-east-1".to_string()
    }
    async fn endpoints(&self) -> EndpointList {
        EndpointList::new(self.0.lock().clone())
    }
}

fn ep(host: &str) -> Endpoint {
    Endpoint::new(host, 80, false, "us-east-1")
}

#[tokio::test]
async fn s6_peer_set_diff_apply_across_two_reconciliations() {
    let shutdowns = Arc::new(AtomicUsize::new(0));
    let factory = Arc::new(CountingFactory { shutdowns: shutdowns.clone(), fail_for: vec![] });
    let resolver = Arc::new(SwappableResolver(parking_lot::Mutex::new(vec![ep("a"), ep("b")])));
    let set = PeerNodeSet::new(resolver.clone(), factory, "local", LocalNodeMatch::Hostname, Duration::from_secs(3600));

    set.reconcile().await;
    assert_eq!(set.peer_count(), 2);

    *resolver.0.lock() = vec![ep("b"), ep("c")];
    set.reconcile().await;

    let urls: HashSet<String> = set.peer_urls();
    assert!(urls.contains(&ep("b").serialized_url()));
    assert!(urls.contains(&ep("c").serialized_url()));
    assert!(!urls.contains(&ep("a").serialized_url()));
    // "a" was torn down, "b" was kept, "c" was constructed fresh: one shutdown call.
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

    set.shutdown().await;
    assert_eq!(set.peer_count(), 0);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 3);
}
