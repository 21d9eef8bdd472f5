//! PeerNodeSet — periodically recomputes the set of peer replication URLs
//! and diff-applies it: new peer clients are constructed, stale ones are
//! shut down, mirroring the pattern most connection-pool
//! managers use to reconcile a desired set against a running one without
//! tearing down everything on every tick.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{instrument, warn};

use crate::endpoint::Endpoint;
use crate::error::PeerError;
use crate::resolver::Resolver;
use crate::transport::HttpClient;

/// A single peer connection. Holds its transport client and is responsible
/// for shutting it down exactly once, on removal or on `PeerNodeSet`
/// shutdown.
pub struct PeerNode {
    pub url: String,
    client: Box<dyn HttpClient>,
}

impl PeerNode {
    pub fn new(url: impl Into<String>, client: Box<dyn HttpClient>) -> Self {
        PeerNode { url: url.into(), client }
    }

    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

/// Constructs a [`PeerNode`] bound to a peer's resolved endpoint. The wire
/// transport it wraps is out of scope for this crate.
#[async_trait]
pub trait PeerNodeFactory: Send + Sync {
    async fn create(&self, endpoint: &Endpoint) -> Result<PeerNode, PeerError>;
}

struct PeerState {
    urls: HashSet<String>,
    nodes: Vec<PeerNode>,
}

#[derive(Debug, Clone, Copy)]
pub enum LocalNodeMatch {
    Hostname,
    Ip(IpAddr),
}

pub struct PeerNodeSet {
    resolver: Arc<dyn Resolver>,
    factory: Arc<dyn PeerNodeFactory>,
    local_host: String,
    local_match: LocalNodeMatch,
    update_interval: Duration,
    state: RwLock<PeerState>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl PeerNodeSet {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        factory: Arc<dyn PeerNodeFactory>,
        local_host: impl Into<String>,
        local_match: LocalNodeMatch,
        update_interval: Duration,
    ) -> Self {
        PeerNodeSet {
            resolver,
            factory,
            local_host: local_host.into(),
            local_match,
            update_interval,
            state: RwLock::new(PeerState { urls: HashSet::new(), nodes: Vec::new() }),
            scheduler: Mutex::new(None),
        }
    }

    pub fn peer_urls(&self) -> HashSet<String> {
        self.state.read().urls.clone()
    }

    pub fn peer_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    fn is_local(&self, endpoint: &Endpoint) -> bool {
        match self.local_match {
            LocalNodeMatch::Hostname => endpoint.host == self.local_host,
            LocalNodeMatch::Ip(ip) => endpoint.host == ip.to_string(),
        }
    }

    /// Starts the single-thread periodic scheduler: runs one immediate
    /// reconciliation, then schedules further ones at `update_interval`.
    /// Must be called on an `Arc` since the scheduler task holds a clone.
    pub fn start(self: &Arc<Self>) {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            this.reconcile().await;
            let mut ticker = tokio::time::interval(this.update_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                this.reconcile().await;
            }
        });
        *self.scheduler.lock() = Some(handle);
    }

    /// Stops the scheduler, swaps the node list out atomically, and shuts
    /// each node down.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.scheduler.lock().take() {
            handle.abort();
        }
        let nodes = {
            let mut state = self.state.write();
            state.urls.clear();
            std::mem::take(&mut state.nodes)
        };
        for node in nodes {
            node.shutdown().await;
        }
    }

    /// Builds the desired peer URL set from the resolver, filtering out the
    /// local node's own URL, then diff-applies: constructs nodes for
    /// `toAdd`, shuts down nodes for `toRemove`. An empty desired list
    /// leaves state unchanged.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) {
        let resolved = self.resolver.endpoints().await;
        let desired: Vec<Endpoint> = resolved.into_iter().filter(|e| !self.is_local(e)).collect();

        if desired.is_empty() {
            warn!("peer reconciliation produced an empty desired set; leaving current peers unchanged");
            return;
        }

        let desired_urls: HashSet<String> = desired.iter().map(Endpoint::serialized_url).collect();

        let existing_urls = self.state.read().urls.clone();
        let to_add: Vec<Endpoint> = desired.into_iter().filter(|e| !existing_urls.contains(&e.serialized_url())).collect();

        let mut new_nodes = Vec::with_capacity(to_add.len());
        for endpoint in to_add {
            match self.factory.create(&endpoint).await {
                Ok(node) => new_nodes.push(node),
                Err(e) => warn!(peer_url = %endpoint, error = %e, "failed to construct peer node"),
            }
        }

        let stale = {
            let mut state = self.state.write();
            let (keep, stale): (Vec<PeerNode>, Vec<PeerNode>) =
                std::mem::take(&mut state.nodes).into_iter().partition(|n| desired_urls.contains(&n.url));
            state.nodes = keep;
            state.nodes.extend(new_nodes);
            state.urls = state.nodes.iter().map(|n| n.url.clone()).collect();
            stale
        };

        for node in stale {
            node.shutdown().await;
        }
    }
}
