//! RedirectingClient — follows a bounded 3xx chain, then pins to the
//! terminal endpoint by IP.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use regex::Regex;
use tracing::{instrument, warn};

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::transport::{DnsResolver, EurekaHttpResponse, HttpClient, HttpClientFactory};

use super::call::{apply_call, Call};

const MAX_REDIRECT_HOPS: usize = 10;

fn redirect_path_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*/v2/)apps(/.*)?$").expect("static regex is valid"))
}

/// Splits an absolute URL into `(host_without_port, path)`.
fn split_location(location: &str) -> Option<(&str, &str)> {
    let (_, rest) = location.split_once("://")?;
    let path_start = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..path_start];
    let host = authority.split(':').next().unwrap_or(authority);
    let path = &rest[path_start..];
    Some((host, path))
}

fn redirect_path_prefix(location: &str) -> Result<String, ClientError> {
    let (_, path) = split_location(location)
        .ok_or_else(|| ClientError::InvalidRedirect(format!("not an absolute URL: {location}")))?;
    let caps = redirect_path_regex()
        .captures(path)
        .ok_or_else(|| ClientError::InvalidRedirect(format!("path does not match expected apps route: {path}")))?;
    Ok(caps.get(1).unwrap().as_str().to_string())
}

fn redirect_host(location: &str) -> Result<String, ClientError> {
    let (host, _) = split_location(location)
        .ok_or_else(|| ClientError::InvalidRedirect(format!("not an absolute URL: {location}")))?;
    Ok(host.to_string())
}

/// Follows 3xx redirects up to [`MAX_REDIRECT_HOPS`], then pins the
/// terminal (non-3xx) client so subsequent requests skip the chain.
pub struct RedirectingClient {
    factory: Arc<dyn HttpClientFactory>,
    dns: Arc<dyn DnsResolver>,
    service_endpoint: Endpoint,
    pinned: ArcSwapOption<dyn HttpClient>,
}

impl RedirectingClient {
    pub fn new(factory: Arc<dyn HttpClientFactory>, dns: Arc<dyn DnsResolver>, service_endpoint: Endpoint) -> Self {
        RedirectingClient {
            factory,
            dns,
            service_endpoint,
            pinned: ArcSwapOption::empty(),
        }
    }

    #[instrument(skip(self, call), fields(endpoint = %self.service_endpoint))]
    pub async fn execute(&self, call: Call<'_>) -> Result<EurekaHttpResponse, ClientError> {
        if let Some(pinned) = self.pinned.load_full() {
            return match apply_call(pinned.as_ref(), &call).await {
                Ok(resp) => Ok(resp),
                Err(e) => {
                    self.pinned.store(None);
                    pinned.shutdown().await;
                    Err(e)
                }
            };
        }

        let mut client: Arc<dyn HttpClient> = Arc::from(self.factory.create(&self.service_endpoint).await?);
        let scheme = self.service_endpoint.scheme().to_string();

        for _hop in 0..MAX_REDIRECT_HOPS {
            let resp = match apply_call(client.as_ref(), &call).await {
                Ok(resp) => resp,
                Err(e) => {
                    client.shutdown().await;
                    return Err(e);
                }
            };

            if !resp.is_redirect() {
                let previous = self.pinned.swap(Some(client.clone()));
                if let Some(prev) = previous {
                    prev.shutdown().await;
                }
                return Ok(resp);
            }

            let location = resp
                .location
                .clone()
                .ok_or_else(|| ClientError::InvalidRedirect("3xx response carried no Location header".into()))?;
            let prefix = redirect_path_prefix(&location)?;
            let host = redirect_host(&location)?;

            client.shutdown().await;
            let ip = self.dns.resolve(&host).await?;
            client = Arc::from(self.factory.create_for_url(&scheme, &ip.to_string(), None, &prefix).await?);
        }

        warn!(hops = MAX_REDIRECT_HOPS, "redirect chain exceeded hop limit");
        client.shutdown().await;
        Err(ClientError::RedirectLimitExceeded)
    }
}

/// Lets a `RedirectingClient` stand in wherever a plain `HttpClient` is
/// expected, so `RetryableClient`'s factory can return one directly and the
/// decorator stack composes without a separate call-dispatch seam per layer.
#[async_trait]
impl HttpClient for RedirectingClient {
    async fn register(&self, instance_info: &[u8]) -> Result<EurekaHttpResponse, ClientError> {
        self.execute(Call::Register(instance_info)).await
    }
    async fn cancel(&self, app_name: &str, instance_id: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.execute(Call::Cancel { app_name, instance_id }).await
    }
    async fn send_heartbeat(&self, app_name: &str, instance_id: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.execute(Call::Heartbeat { app_name, instance_id }).await
    }
    async fn status_update(&self, app_name: &str, instance_id: &str, status: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.execute(Call::StatusUpdate { app_name, instance_id, status }).await
    }
    async fn get_applications(&self) -> Result<EurekaHttpResponse, ClientError> {
        self.execute(Call::GetApplications).await
    }
    async fn get_delta(&self) -> Result<EurekaHttpResponse, ClientError> {
        self.execute(Call::GetDelta).await
    }
    async fn get_vip(&self, vip_address: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.execute(Call::GetVip { vip_address }).await
    }
    async fn get_by_id(&self, app_name: &str, instance_id: &str) -> Result<EurekaHttpResponse, ClientError> {
        self.execute(Call::GetById { app_name, instance_id }).await
    }
    async fn shutdown(&self) {
        if let Some(pinned) = self.pinned.swap(None) {
            pinned.shutdown().await;
        }
    }
}

/// Adapts an inner `HttpClientFactory` into one whose clients follow 3xx
/// redirect chains and pin to the terminal endpoint. This is the factory
/// `RetryableClient` is given, so each candidate it selects gets its own
/// redirect-aware client.
pub struct RedirectingClientFactory {
    inner: Arc<dyn HttpClientFactory>,
    dns: Arc<dyn DnsResolver>,
}

impl RedirectingClientFactory {
    pub fn new(inner: Arc<dyn HttpClientFactory>, dns: Arc<dyn DnsResolver>) -> Self {
        RedirectingClientFactory { inner, dns }
    }
}

#[async_trait]
impl HttpClientFactory for RedirectingClientFactory {
    async fn create(&self, endpoint: &Endpoint) -> Result<Box<dyn HttpClient>, ClientError> {
        Ok(Box::new(RedirectingClient::new(self.inner.clone(), self.dns.clone(), endpoint.clone())))
    }

    async fn create_for_url(&self, scheme: &str, host: &str, port: Option<u16>, path: &str) -> Result<Box<dyn HttpClient>, ClientError> {
        let secure = scheme == "https";
        let port = port.unwrap_or(if secure { 443 } else { 80 });
        let endpoint = Endpoint::new(host, port, secure, "").with_path_prefix(path);
        Ok(Box::new(RedirectingClient::new(self.inner.clone(), self.dns.clone(), endpoint)))
    }
}
