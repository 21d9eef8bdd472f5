//! Error taxonomy for the resolver/client/cache stack.
//!
//! Each component owns a focused error enum named after its behavior in
//! its own failure modes, not a generic "Error". [`DiscoveryError`] is the sum type used
//! at call sites that cross component boundaries.

use thiserror::Error;

use crate::endpoint::Endpoint;

#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("region '{0}' has no configured zones and no default table entry")]
    MappingMissing(String),
}

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("initial resolution returned no endpoints and failFast is enabled")]
    InitialResolutionFailed,
    #[error(transparent)]
    Zone(#[from] ZoneError),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no reachable server: candidate list is empty after quarantine pruning")]
    NoReachableServer,
    #[error("exhausted {0} retry attempts without an accepted response")]
    RetryLimitExceeded(usize),
    #[error("redirect chain exceeded 10 hops")]
    RedirectLimitExceeded,
    #[error("invalid redirect: {0}")]
    InvalidRedirect(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("payload generation failed: {0}")]
    Encoder(String),
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("failed to construct peer client for {url}: {reason}")]
    ConstructionFailed { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Zone(#[from] ZoneError),
}

/// Marks an endpoint as the source of a failed attempt, used by callers that
/// want to report both the error and which candidate it came from without
/// threading the endpoint through every error variant above.
#[derive(Debug, Error)]
#[error("{source} (endpoint: {endpoint})")]
pub struct AttemptFailure {
    pub endpoint: Endpoint,
    #[source]
    pub source: ClientError,
}
