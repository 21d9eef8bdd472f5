//! DiscoveryConfig — the component options table, loaded from TOML with
//! environment-variable overrides, using a nested-struct + serde layout
//! consistent with the rest of this crate's ambient stack.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub region: String,
    pub availability_zones: HashMap<String, Vec<String>>,
    pub prefer_same_zone: bool,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        ZoneConfig {
            region: "us-east-1".to_string(),
            availability_zones: HashMap::new(),
            prefer_same_zone: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub refresh_interval_ms: u64,
    pub fail_fast_on_empty_warmup: bool,
    pub should_fetch_registry: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            refresh_interval_ms: 30_000,
            fail_fast_on_empty_warmup: false,
            should_fetch_registry: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub max_attempts: usize,
    pub quarantine_refresh_fraction: f64,
    pub session_duration_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            max_attempts: 3,
            quarantine_refresh_fraction: 0.66,
            session_duration_ms: 20 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub auto_expire_seconds: u64,
    pub cache_update_interval_ms: u64,
    pub read_only_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            auto_expire_seconds: 180,
            cache_update_interval_ms: 30_000,
            read_only_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub peer_update_interval_ms: u64,
    pub applications_resolver_use_ip: bool,
}

impl Default for PeerConfig {
    fn default() -> Self {
        PeerConfig {
            peer_update_interval_ms: 10_000,
            applications_resolver_use_ip: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub zone: ZoneConfig,
    pub resolver: ResolverConfig,
    pub client: ClientConfig,
    pub cache: CacheConfig,
    pub peer: PeerConfig,
}

impl DiscoveryConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        let mut config: DiscoveryConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let serialized = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), serialized)
            .map_err(|source| ConfigError::Io { path: path.as_ref().display().to_string(), source })
    }

    /// Overrides honored: `DISCO_REGION`, `DISCO_MAX_ATTEMPTS`,
    /// `DISCO_SESSION_DURATION_MS`, `DISCO_CACHE_UPDATE_INTERVAL_MS`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(region) = std::env::var("DISCO_REGION") {
            self.zone.region = region;
        }
        if let Ok(v) = std::env::var("DISCO_MAX_ATTEMPTS") {
            if let Ok(n) = v.parse() {
                self.client.max_attempts = n;
            }
        }
        if let Ok(v) = std::env::var("DISCO_SESSION_DURATION_MS") {
            if let Ok(n) = v.parse() {
                self.client.session_duration_ms = n;
            }
        }
        if let Ok(v) = std::env::var("DISCO_CACHE_UPDATE_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                self.cache.cache_update_interval_ms = n;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.max_attempts == 0 {
            return Err(ConfigError::Invalid("client.max_attempts must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.client.quarantine_refresh_fraction) {
            return Err(ConfigError::Invalid("client.quarantine_refresh_fraction must be in [0, 1]".into()));
        }
        if self.cache.cache_update_interval_ms == 0 {
            return Err(ConfigError::Invalid("cache.cache_update_interval_ms must be positive".into()));
        }
        if self.peer.peer_update_interval_ms == 0 {
            return Err(ConfigError::Invalid("peer.peer_update_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_millis(self.client.session_duration_ms)
    }

    pub fn auto_expire(&self) -> Duration {
        Duration::from_secs(self.cache.auto_expire_seconds)
    }

    pub fn cache_update_interval(&self) -> Duration {
        Duration::from_millis(self.cache.cache_update_interval_ms)
    }

    pub fn peer_update_interval(&self) -> Duration {
        Duration::from_millis(self.peer.peer_update_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.resolver.refresh_interval_ms)
    }
}
