//! ConfigResolver — the leaf resolver, producing endpoints from static
//! configuration.

use async_trait::async_trait;

use crate::endpoint::{Endpoint, EndpointList};

use super::Resolver;

/// Produces endpoints from configuration keyed by region and zone. Output
/// ordering is unspecified; callers needing locality must wrap this in a
/// [`super::ZoneAffinityResolver`].
pub struct ConfigResolver {
    region: String,
    endpoints: Vec<Endpoint>,
}

impl ConfigResolver {
    pub fn new(region: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        ConfigResolver {
            region: region.into(),
            endpoints,
        }
    }
}

#[async_trait]
impl Resolver for ConfigResolver {
    fn region(&self) -> String {
        self.region.clone()
    }

    async fn endpoints(&self) -> EndpointList {
        EndpointList::new(self.endpoints.clone())
    }
}
