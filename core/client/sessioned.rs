//! SessionedClient — forces client re-creation at a jittered interval so
//! long-lived connections don't pin load to one instance behind a VIP.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;

use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::transport::{EurekaHttpResponse, HttpClient, HttpClientFactory};

use super::call::{apply_call, Call};

struct SessionState {
    last_reconnect_at: Instant,
    current_session: Duration,
}

/// `randomize(d) = d + d * (U[0,1) - 0.5)`, uniform in `[d/2, 3d/2)`.
fn randomize(d: Duration) -> Duration {
    let jitter = rand::thread_rng().gen::<f64>() - 0.5;
    Duration::from_secs_f64(d.as_secs_f64() * (1.0 + jitter))
}

pub struct SessionedClient {
    factory: Arc<dyn HttpClientFactory>,
    endpoint: Endpoint,
    session_duration: Duration,
    state: Mutex<SessionState>,
    client: Mutex<Option<Arc<dyn HttpClient>>>,
}

impl SessionedClient {
    pub fn new(factory: Arc<dyn HttpClientFactory>, endpoint: Endpoint, session_duration: Duration) -> Self {
        SessionedClient {
            factory,
            endpoint,
            state: Mutex::new(SessionState {
                last_reconnect_at: Instant::now(),
                current_session: randomize(session_duration),
            }),
            session_duration,
            client: Mutex::new(None),
        }
    }

    /// Closes the current client if the session has expired. Guarded by a
    /// per-slot update: two callers arriving at expiry simultaneously may
    /// both observe expiry and both race to install a replacement, but only
    /// one install wins — the loser shuts its candidate down immediately.
    async fn expire_if_due(&self) {
        let due = {
            let mut state = self.state.lock();
            let now = Instant::now();
            if now.duration_since(state.last_reconnect_at) >= state.current_session {
                state.last_reconnect_at = now;
                state.current_session = randomize(self.session_duration);
                true
            } else {
                false
            }
        };

        if due {
            let retiring = self.client.lock().take();
            if let Some(old) = retiring {
                old.shutdown().await;
            }
        }
    }

    async fn current_client(&self) -> Result<Arc<dyn HttpClient>, ClientError> {
        if let Some(existing) = self.client.lock().clone() {
            return Ok(existing);
        }

        let candidate: Arc<dyn HttpClient> = Arc::from(self.factory.create(&self.endpoint).await?);

        let mut slot = self.client.lock();
        match slot.clone() {
            Some(winner) => {
                drop(slot);
                candidate.shutdown().await;
                Ok(winner)
            }
            None => {
                *slot = Some(candidate.clone());
                Ok(candidate)
            }
        }
    }

    pub async fn execute(&self, call: Call<'_>) -> Result<EurekaHttpResponse, ClientError> {
        self.expire_if_due().await;
        let client = self.current_client().await?;
        apply_call(client.as_ref(), &call).await
    }
}

#[async_trait]
impl HttpClient for SessionedClient {
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
        if let Some(client) = self.client.lock().take() {
            client.shutdown().await;
        }
    }
}

/// Adapts an inner `HttpClientFactory` (the real wire transport) into one
/// whose clients enforce jittered periodic reconnection. This is the
/// factory `RedirectingClient` is given so the pinned terminal client it
/// produces is itself session-rotating.
pub struct SessionedClientFactory {
    inner: Arc<dyn HttpClientFactory>,
    session_duration: Duration,
}

impl SessionedClientFactory {
    pub fn new(inner: Arc<dyn HttpClientFactory>, session_duration: Duration) -> Self {
        SessionedClientFactory { inner, session_duration }
    }
}

#[async_trait]
impl HttpClientFactory for SessionedClientFactory {
    async fn create(&self, endpoint: &Endpoint) -> Result<Box<dyn HttpClient>, ClientError> {
        Ok(Box::new(SessionedClient::new(self.inner.clone(), endpoint.clone(), self.session_duration)))
    }

    async fn create_for_url(&self, scheme: &str, host: &str, port: Option<u16>, path: &str) -> Result<Box<dyn HttpClient>, ClientError> {
        let secure = scheme == "https";
        let port = port.unwrap_or(if secure { 443 } else { 80 });
        let endpoint = Endpoint::new(host, port, secure, "").with_path_prefix(path);
        Ok(Box::new(SessionedClient::new(self.inner.clone(), endpoint, self.session_duration)))
    }
}
