//! EndpointUtils — shuffle helpers shared by the resolver hierarchy.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::endpoint::Endpoint;

/// Partitions `endpoints` into `(local, other)` by zone, preserving input
/// order within each partition. If `my_zone` is `None`, every endpoint goes
/// to `other`.
pub fn split_by_zone(endpoints: &[Endpoint], my_zone: Option<&str>) -> (Vec<Endpoint>, Vec<Endpoint>) {
    let mut local = Vec::new();
    let mut other = Vec::new();

    let my_zone = match my_zone {
        Some(z) => z,
        None => {
            other.extend(endpoints.iter().cloned());
            return (local, other);
        }
    };

    for e in endpoints {
        if e.zone.as_deref() == Some(my_zone) {
            local.push(e.clone());
        } else {
            other.push(e.clone());
        }
    }
    (local, other)
}

/// Fisher-Yates shuffle seeded by a stable hash of the local IPv4 address.
///
/// Across hosts, load is spread because each host has a different seed;
/// on a single host, the order is stable across calls, which gives
/// incremental-fetch locality against an eventually-consistent server.
pub fn randomize(list: &[Endpoint], local_ip: Ipv4Addr) -> Vec<Endpoint> {
    let mut out = list.to_vec();
    let seed = seed_from_ip(local_ip);
    let mut rng = StdRng::seed_from_u64(seed);
    out.shuffle(&mut rng);
    out
}

fn seed_from_ip(ip: Ipv4Addr) -> u64 {
    u32::from_be_bytes(ip.octets()) as u64
}

/// Set-equality of endpoints, order-insensitive.
pub fn identical(a: &[Endpoint], b: &[Endpoint]) -> bool {
    let sa: HashSet<&Endpoint> = a.iter().collect();
    let sb: HashSet<&Endpoint> = b.iter().collect();
    sa == sb
}
