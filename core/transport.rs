//! The `HttpClient` contract exposed to callers and consumed by the
//! decorator stack, plus the seams for the two external
//! collaborators this core treats as opaque: the wire transport primitive
//! and the DNS resolution primitive.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::error::ClientError;

/// Distinguishes write requests (registration, heartbeat, status update,
/// cancel) from read requests (fetch applications/delta/vip/by-id) for the
/// [`StatusEvaluator`] contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Register,
    Cancel,
    Heartbeat,
    StatusUpdate,
    Read,
}

impl RequestKind {
    pub fn is_write(self) -> bool {
        !matches!(self, RequestKind::Read)
    }
}

/// Response from any `HttpClient` operation. `location` is present iff
/// `status_code` is one of 301, 302, 307, 308.
#[derive(Debug, Clone)]
pub struct EurekaHttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub entity: Option<Vec<u8>>,
    pub location: Option<String>,
}

impl EurekaHttpResponse {
    pub fn new(status_code: u16) -> Self {
        EurekaHttpResponse {
            status_code,
            headers: HashMap::new(),
            entity: None,
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_entity(mut self, entity: Vec<u8>) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status_code, 301 | 302 | 307 | 308)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// A uniform set of request operations against an Eureka-style registry
/// server. Registration/heartbeat request semantics beyond their
/// status-code classification are out of scope here; this core only needs
/// the response envelope.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn register(&self, instance_info: &[u8]) -> Result<EurekaHttpResponse, ClientError>;
    async fn cancel(&self, app_name: &str, instance_id: &str) -> Result<EurekaHttpResponse, ClientError>;
    async fn send_heartbeat(&self, app_name: &str, instance_id: &str) -> Result<EurekaHttpResponse, ClientError>;
    async fn status_update(&self, app_name: &str, instance_id: &str, status: &str) -> Result<EurekaHttpResponse, ClientError>;
    async fn get_applications(&self) -> Result<EurekaHttpResponse, ClientError>;
    async fn get_delta(&self) -> Result<EurekaHttpResponse, ClientError>;
    async fn get_vip(&self, vip_address: &str) -> Result<EurekaHttpResponse, ClientError>;
    async fn get_by_id(&self, app_name: &str, instance_id: &str) -> Result<EurekaHttpResponse, ClientError>;

    /// Releases any resources held by this client. Idempotent.
    async fn shutdown(&self);
}

/// Constructs a fresh `HttpClient` bound to a specific endpoint. This is the
/// seam at which the decorator stack reaches the external wire-transport
/// primitive (out of scope for this crate); a production binary supplies a
/// factory backed by the real transport.
#[async_trait]
pub trait HttpClientFactory: Send + Sync {
    async fn create(&self, endpoint: &Endpoint) -> Result<Box<dyn HttpClient>, ClientError>;
    /// Constructs a client targeting an explicit `scheme://host[:port]/path`
    /// URL, used by [`crate::client::RedirectingClient`] to pin to a
    /// resolved IP without going through the endpoint resolver.
    async fn create_for_url(&self, scheme: &str, host: &str, port: Option<u16>, path: &str) -> Result<Box<dyn HttpClient>, ClientError>;
}

/// The DNS resolution primitive (out of scope for this crate): resolves a
/// hostname to a single IP address for `RedirectingClient`'s IP-pinning
/// behavior.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<IpAddr, ClientError>;
}
