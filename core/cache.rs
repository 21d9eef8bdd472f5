//! ResponseCache — a two-tier response cache for server-side payload
//! generation, with single-flight loading and a background reconciler that
//! lags the writable tier by at most `cacheUpdateIntervalMs`.
//!
//! The instance registry and the serialization codec are both out of scope
//! (treated as an opaque source of application snapshots and an opaque
//! encoder); [`PayloadSource`] is the seam a server binary supplies
//! to bridge this cache to its real registry and encoders.

use std::io::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{instrument, warn};

use crate::error::CacheError;

pub const ALL_APPS: &str = "ALL_APPS";
pub const ALL_APPS_DELTA: &str = "ALL_APPS_DELTA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Application,
    Vip,
    Svip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcceptLevel {
    Full,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity_kind: EntityKind,
    pub name: String,
    pub content_type: String,
    pub api_version: String,
    pub accept_level: AcceptLevel,
    pub regions: Option<Vec<String>>,
}

impl CacheKey {
    pub fn new(
        entity_kind: EntityKind,
        name: impl Into<String>,
        content_type: impl Into<String>,
        api_version: impl Into<String>,
        accept_level: AcceptLevel,
    ) -> Self {
        CacheKey {
            entity_kind,
            name: name.into(),
            content_type: content_type.into(),
            api_version: api_version.into(),
            accept_level,
            regions: None,
        }
    }

    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.regions = Some(regions);
        self
    }

    pub fn has_regions(&self) -> bool {
        self.regions.is_some()
    }

    /// The canonical sibling of this key with `regions` cleared. Every
    /// region-parameterized key is indexed under its regionless sibling in
    /// `regionSpecificKeys` so a single invalidation fans out to all of them.
    pub fn regionless(&self) -> CacheKey {
        let mut k = self.clone();
        k.regions = None;
        k
    }
}

#[derive(Debug, Clone)]
pub struct CacheValue {
    payload: Arc<[u8]>,
    gzipped: Option<Arc<[u8]>>,
}

impl CacheValue {
    pub fn new(payload: Vec<u8>) -> Result<Self, CacheError> {
        let gzipped = if payload.is_empty() {
            None
        } else {
            Some(Arc::from(gzip(&payload)?))
        };
        Ok(CacheValue { payload: Arc::from(payload), gzipped })
    }

    pub fn empty() -> Self {
        CacheValue { payload: Arc::from(Vec::new()), gzipped: None }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn gzipped(&self) -> Option<&[u8]> {
        self.gzipped.as_deref()
    }

    /// Reference-equality check used by the reconciler: a value is
    /// "unchanged" iff it is the very instance already installed in
    /// ReadOnly, not merely byte-equal to it.
    fn same_instance(&self, other: &CacheValue) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|e| CacheError::Encoder(e.to_string()))?;
    encoder.finish().map_err(|e| CacheError::Encoder(e.to_string()))
}

/// The opaque collaborator that turns a [`CacheKey`] into encoded bytes. A
/// real implementation reaches into the instance registry and an
/// encoder selected by `(content_type, accept_level)`; both are out of
/// scope for this crate.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn generate(&self, key: &CacheKey) -> Result<Vec<u8>, CacheError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseCacheConfig {
    pub auto_expire: Duration,
    pub cache_update_interval: Duration,
    pub read_only_enabled: bool,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        ResponseCacheConfig {
            auto_expire: Duration::from_secs(180),
            cache_update_interval: Duration::from_secs(30),
            read_only_enabled: true,
        }
    }
}

struct WritableEntry {
    value: CacheValue,
    written_at: Instant,
}

pub struct ResponseCache {
    read_write: DashMap<CacheKey, WritableEntry>,
    read_only: DashMap<CacheKey, CacheValue>,
    region_specific_keys: DashMap<CacheKey, DashSet<CacheKey>>,
    in_flight: DashMap<CacheKey, Arc<AsyncMutex<()>>>,
    source: Arc<dyn PayloadSource>,
    config: ResponseCacheConfig,
    version_delta: AtomicU64,
    version_delta_with_regions: AtomicU64,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl ResponseCache {
    pub fn new(source: Arc<dyn PayloadSource>, config: ResponseCacheConfig) -> Arc<Self> {
        Arc::new(ResponseCache {
            read_write: DashMap::with_capacity(1000),
            read_only: DashMap::new(),
            region_specific_keys: DashMap::new(),
            in_flight: DashMap::new(),
            source,
            config,
            version_delta: AtomicU64::new(0),
            version_delta_with_regions: AtomicU64::new(0),
            ticker: Mutex::new(None),
        })
    }

    /// Starts the background reconciler. Must be called on an `Arc` since
    /// the ticker task holds a clone of it for its own lifetime.
    pub fn start(self: &Arc<Self>) {
        let this = self.clone();
        let interval = self.config.cache_update_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                this.reconcile_once().await;
            }
        });
        *self.ticker.lock() = Some(handle);
    }

    pub fn shutdown(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }

    pub fn current_size(&self) -> usize {
        self.read_write.len()
    }

    pub fn version_delta(&self) -> u64 {
        self.version_delta.load(Ordering::SeqCst)
    }

    pub fn version_delta_with_regions(&self) -> u64 {
        self.version_delta_with_regions.load(Ordering::SeqCst)
    }

    #[instrument(skip(self, key), fields(cache_key = ?key))]
    pub async fn get(&self, key: &CacheKey, use_read_only: bool) -> CacheValue {
        if use_read_only {
            if let Some(v) = self.read_only.get(key) {
                return v.clone();
            }
        }

        if let Some(fresh) = self.fresh_read_write(key) {
            self.backfill_read_only(key, &fresh, use_read_only);
            return fresh;
        }

        let lock = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(fresh) = self.fresh_read_write(key) {
            self.backfill_read_only(key, &fresh, use_read_only);
            return fresh;
        }

        let value = self.load(key).await;
        self.read_write.insert(key.clone(), WritableEntry { value: value.clone(), written_at: Instant::now() });
        self.backfill_read_only(key, &value, use_read_only);
        value
    }

    fn fresh_read_write(&self, key: &CacheKey) -> Option<CacheValue> {
        let entry = self.read_write.get(key)?;
        if entry.written_at.elapsed() < self.config.auto_expire {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn backfill_read_only(&self, key: &CacheKey, value: &CacheValue, use_read_only: bool) {
        if use_read_only && self.config.read_only_enabled && !self.read_only.contains_key(key) {
            self.read_only.insert(key.clone(), value.clone());
        }
    }

    async fn load(&self, key: &CacheKey) -> CacheValue {
        if key.has_regions() {
            self.region_specific_keys
                .entry(key.regionless())
                .or_insert_with(DashSet::new)
                .insert(key.clone());
        }

        match self.source.generate(key).await {
            Ok(bytes) => {
                if key.entity_kind == EntityKind::Application && key.name == ALL_APPS_DELTA {
                    if key.has_regions() {
                        self.version_delta_with_regions.fetch_add(1, Ordering::SeqCst);
                    } else {
                        self.version_delta.fetch_add(1, Ordering::SeqCst);
                    }
                }
                CacheValue::new(bytes).unwrap_or_else(|e| {
                    warn!(cache_key = ?key, error = %e, "payload encoding failed; returning empty value");
                    CacheValue::empty()
                })
            }
            Err(e) => {
                warn!(cache_key = ?key, error = %e, "payload generation failed; returning empty value");
                CacheValue::empty()
            }
        }
    }

    /// Evicts `appName`, `ALL_APPS`, `ALL_APPS_DELTA`, and, if provided, the
    /// named VIP/SVIP — fanning each eviction out through
    /// `regionSpecificKeys`. ReadOnly is left untouched; the next
    /// reconciler tick propagates the change.
    pub fn invalidate(&self, app_name: &str, vip: Option<&str>, svip: Option<&str>) {
        let mut names: Vec<&str> = vec![app_name, ALL_APPS, ALL_APPS_DELTA];
        names.extend(vip);
        names.extend(svip);

        let to_evict: Vec<CacheKey> = self
            .read_write
            .iter()
            .filter(|entry| names.contains(&entry.key().name.as_str()))
            .map(|entry| entry.key().clone())
            .collect();

        for key in to_evict {
            self.evict_with_siblings(&key);
        }
    }

    fn evict_with_siblings(&self, key: &CacheKey) {
        self.read_write.remove(key);
        self.in_flight.remove(key);
        if let Some((_, siblings)) = self.region_specific_keys.remove(&key.regionless()) {
            for sibling in siblings.iter() {
                self.read_write.remove(sibling.key());
            }
        }
    }

    /// For each key currently in ReadOnly, refill ReadWrite if it has
    /// expired or was evicted, then overwrite ReadOnly unless the value is
    /// the same instance already installed.
    async fn reconcile_once(&self) {
        let keys: Vec<CacheKey> = self.read_only.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            let fresh = match self.fresh_read_write(&key) {
                Some(v) => v,
                None => {
                    let value = self.load(&key).await;
                    self.read_write.insert(key.clone(), WritableEntry { value: value.clone(), written_at: Instant::now() });
                    value
                }
            };

            let differs = match self.read_only.get(&key) {
                Some(existing) => !existing.same_instance(&fresh),
                None => true,
            };
            if differs {
                self.read_only.insert(key.clone(), fresh);
            }
        }
    }
}
