//! The resolver hierarchy: Config -> ZoneAffinity -> Async -> Composite
//! and the shared resolver contract each layer implements.

mod async_resolver;
mod composite;
mod config_resolver;
mod zone_affinity;

pub use async_resolver::{AsyncResolver, AsyncResolverConfig};
pub use composite::CompositeResolver;
pub use config_resolver::ConfigResolver;
pub use zone_affinity::ZoneAffinityResolver;

use async_trait::async_trait;

use crate::endpoint::EndpointList;

/// Contract implemented by every layer of the resolver hierarchy. Callers
/// assume `endpoints()` is cheap; implementations are free to cache.
#[async_trait]
pub trait Resolver: Send + Sync {
    fn region(&self) -> String;
    async fn endpoints(&self) -> EndpointList;
}
