//! RetryableClient — iterates candidate endpoints with quarantine and
//! status-based accept/retry.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use parking_lot::Mutex;
use tracing::{instrument, warn};

use crate::endpoint::Endpoint;
use crate::error::{AttemptFailure, ClientError};
use crate::resolver::Resolver;
use crate::transport::{EurekaHttpResponse, HttpClient, HttpClientFactory};

use super::call::{apply_call, Call};
use super::status_evaluator::StatusEvaluator;

#[derive(Debug, Clone, Copy)]
pub struct RetryableClientConfig {
    pub max_attempts: usize,
    pub quarantine_refresh_fraction: f64,
}

impl Default for RetryableClientConfig {
    fn default() -> Self {
        RetryableClientConfig {
            max_attempts: 3,
            quarantine_refresh_fraction: 0.66,
        }
    }
}

type Delegate = Option<(Endpoint, Arc<dyn HttpClient>)>;

pub struct RetryableClient {
    resolver: Arc<dyn Resolver>,
    factory: Arc<dyn HttpClientFactory>,
    evaluator: Arc<dyn StatusEvaluator>,
    config: RetryableClientConfig,
    delegate: Mutex<Delegate>,
    quarantine: DashSet<Endpoint>,
    last_failure: Mutex<Option<AttemptFailure>>,
}

impl RetryableClient {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        factory: Arc<dyn HttpClientFactory>,
        evaluator: Arc<dyn StatusEvaluator>,
        config: RetryableClientConfig,
    ) -> Self {
        RetryableClient {
            resolver,
            factory,
            evaluator,
            config,
            delegate: Mutex::new(None),
            quarantine: DashSet::new(),
            last_failure: Mutex::new(None),
        }
    }

    /// Current quarantine size, exposed for the `quarantine purge
    /// threshold` testable property.
    pub fn quarantine_size(&self) -> usize {
        self.quarantine.len()
    }

    /// Takes the most recent attempt failure, pairing the offending endpoint
    /// with the error that quarantined it. Returns `None` once consumed or
    /// if every attempt so far has succeeded.
    pub fn take_last_failure(&self) -> Option<AttemptFailure> {
        self.last_failure.lock().take()
    }

    fn prepare_candidates(&self, candidates: &[Endpoint]) -> Vec<Endpoint> {
        let candidate_set: HashSet<&Endpoint> = candidates.iter().collect();
        self.quarantine.retain(|e| candidate_set.contains(e));

        if candidates.is_empty() {
            return Vec::new();
        }

        let threshold = self.config.quarantine_refresh_fraction * candidates.len() as f64;
        if self.quarantine.len() as f64 >= threshold {
            self.quarantine.clear();
            candidates.to_vec()
        } else {
            candidates.iter().filter(|e| !self.quarantine.contains(*e)).cloned().collect()
        }
    }

    #[instrument(skip(self, call))]
    pub async fn execute(&self, call: Call<'_>) -> Result<EurekaHttpResponse, ClientError> {
        let resolved = self.resolver.endpoints().await;
        let candidates = self.prepare_candidates(resolved.as_slice());

        let mut next_candidate = 0usize;

        for attempt in 0..self.config.max_attempts {
            let existing = self.delegate.lock().clone();
            let (endpoint, client) = match existing {
                Some(pair) => pair,
                None => {
                    let endpoint = candidates
                        .get(next_candidate)
                        .cloned()
                        .ok_or(ClientError::NoReachableServer)?;
                    next_candidate += 1;
                    let client: Arc<dyn HttpClient> = Arc::from(self.factory.create(&endpoint).await?);
                    (endpoint, client)
                }
            };

            let outcome = apply_call(client.as_ref(), &call).await;
            match outcome {
                Ok(resp) if self.evaluator.accept(resp.status_code, call.kind()) => {
                    *self.delegate.lock() = Some((endpoint, client));
                    return Ok(resp);
                }
                Ok(resp) => {
                    warn!(attempt, status = resp.status_code, endpoint = %endpoint, "response rejected by status evaluator");
                    *self.delegate.lock() = None;
                    *self.last_failure.lock() = Some(AttemptFailure {
                        endpoint: endpoint.clone(),
                        source: ClientError::Transport(format!("status {} rejected by evaluator", resp.status_code)),
                    });
                    self.quarantine.insert(endpoint);
                    client.shutdown().await;
                }
                Err(e) => {
                    warn!(attempt, endpoint = %endpoint, error = %e, "transport error, quarantining endpoint");
                    *self.delegate.lock() = None;
                    *self.last_failure.lock() = Some(AttemptFailure { endpoint: endpoint.clone(), source: e });
                    self.quarantine.insert(endpoint);
                    client.shutdown().await;
                }
            }
        }

        Err(ClientError::RetryLimitExceeded(self.config.max_attempts))
    }
}

#[async_trait]
impl HttpClient for RetryableClient {
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
        if let Some((_, client)) = self.delegate.lock().take() {
            client.shutdown().await;
        }
    }
}
