//! ZoneAffinityResolver — reorders a delegate's endpoints so local-zone
//! entries come first, or last under anti-affinity.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::endpoint::EndpointList;
use crate::endpoint_utils::{randomize, split_by_zone};

use super::Resolver;

pub struct ZoneAffinityResolver {
    delegate: Arc<dyn Resolver>,
    my_zone: Option<String>,
    local_ip: Ipv4Addr,
    /// `true` prefers same-zone endpoints first; `false` (anti-affinity)
    /// puts them last.
    affinity: bool,
}

impl ZoneAffinityResolver {
    pub fn new(delegate: Arc<dyn Resolver>, my_zone: Option<String>, local_ip: Ipv4Addr, affinity: bool) -> Self {
        ZoneAffinityResolver {
            delegate,
            my_zone,
            local_ip,
            affinity,
        }
    }
}

#[async_trait]
impl Resolver for ZoneAffinityResolver {
    fn region(&self) -> String {
        self.delegate.region()
    }

    async fn endpoints(&self) -> EndpointList {
        let upstream = self.delegate.endpoints().await;
        let (local, other) = split_by_zone(upstream.as_slice(), self.my_zone.as_deref());
        let local = randomize(&local, self.local_ip);
        let other = randomize(&other, self.local_ip);

        let ordered = if self.affinity {
            local.into_iter().chain(other).collect::<Vec<_>>()
        } else {
            other.into_iter().chain(local).collect::<Vec<_>>()
        };
        EndpointList::new(ordered)
    }
}
