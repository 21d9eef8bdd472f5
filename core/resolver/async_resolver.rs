//! AsyncResolver — warms up against a delegate resolver, then serves a
//! cached value refreshed on a background interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::endpoint::EndpointList;
use crate::error::ResolverError;

use super::Resolver;

#[derive(Debug, Clone)]
pub struct AsyncResolverConfig {
    pub refresh_interval: Duration,
    pub fail_fast_on_empty_warmup: bool,
}

impl Default for AsyncResolverConfig {
    fn default() -> Self {
        AsyncResolverConfig {
            refresh_interval: Duration::from_secs(30),
            fail_fast_on_empty_warmup: false,
        }
    }
}

struct Shared {
    delegate: Arc<dyn Resolver>,
    last_value: ArcSwap<EndpointList>,
    last_refresh_at: Mutex<Instant>,
    refreshing: AtomicBool,
}

/// Wraps a delegate resolver with a synchronous warm-up and a background
/// refresh task. After warm-up, `endpoints()` never blocks on the delegate.
pub struct AsyncResolver {
    shared: Arc<Shared>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl AsyncResolver {
    /// Performs one synchronous delegate call. If it returns empty and
    /// `fail_fast_on_empty_warmup` is set, fails with
    /// `InitialResolutionFailed`; otherwise accepts the empty list and
    /// schedules the first background refresh.
    pub async fn new(delegate: Arc<dyn Resolver>, config: AsyncResolverConfig) -> Result<Self, ResolverError> {
        let initial = delegate.endpoints().await;
        if initial.is_empty() && config.fail_fast_on_empty_warmup {
            return Err(ResolverError::InitialResolutionFailed);
        }

        let shared = Arc::new(Shared {
            delegate,
            last_value: ArcSwap::from_pointee(initial),
            last_refresh_at: Mutex::new(Instant::now()),
            refreshing: AtomicBool::new(false),
        });

        let task = spawn_refresh_task(shared.clone(), config.refresh_interval);

        Ok(AsyncResolver {
            shared,
            task: Mutex::new(Some(task)),
        })
    }

    /// Stops the background scheduler. Idempotent.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

fn spawn_refresh_task(shared: Arc<Shared>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it, warm-up already ran
        loop {
            ticker.tick().await;
            shared.refreshing.store(true, Ordering::SeqCst);
            let result = shared.delegate.endpoints().await;
            shared.refreshing.store(false, Ordering::SeqCst);

            if result.is_empty() {
                warn!("AsyncResolver background refresh returned no endpoints; keeping prior value");
                continue;
            }

            shared.last_value.store(Arc::new(result));
            *shared.last_refresh_at.lock() = Instant::now();
            info!("AsyncResolver background refresh succeeded");
        }
    })
}

#[async_trait]
impl Resolver for AsyncResolver {
    fn region(&self) -> String {
        self.shared.delegate.region()
    }

    async fn endpoints(&self) -> EndpointList {
        (**self.shared.last_value.load()).clone()
    }
}

impl Drop for AsyncResolver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
