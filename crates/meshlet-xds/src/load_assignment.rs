//! Load assignment builders

use meshlet_core::{CheckServiceNode, CompiledDiscoveryChain};
use tracing::trace;

use crate::health::normalize;
use crate::resource::{ClusterLoadAssignment, LbEndpoint, LocalityLbEndpoints, Policy, SocketAddress};

/// Build a single-tier load assignment, used for upstreams without a
/// compiled chain (or with a default one) and for prepared queries.
pub fn make_load_assignment(
    cluster_name: &str,
    endpoints: &[CheckServiceNode],
) -> ClusterLoadAssignment {
    ClusterLoadAssignment {
        cluster_name: cluster_name.to_string(),
        endpoints: vec![LocalityLbEndpoints {
            priority: 0,
            lb_endpoints: make_lb_endpoints(endpoints),
        }],
        policy: None,
    }
}

/// Build a load assignment with one priority tier per endpoint set, in
/// order. The overprovisioning policy is only attached for a non-zero factor.
pub fn make_load_assignment_for_discovery_chain(
    cluster_name: &str,
    chain: &CompiledDiscoveryChain,
    overprovisioning_factor: u32,
    priority_endpoints: &[&[CheckServiceNode]],
) -> ClusterLoadAssignment {
    trace!(
        cluster = cluster_name,
        chain = %chain.service_name,
        protocol = %chain.protocol,
        tiers = priority_endpoints.len(),
        "Building tiered load assignment"
    );

    let endpoints = priority_endpoints
        .iter()
        .enumerate()
        .map(|(priority, endpoints)| LocalityLbEndpoints {
            priority: priority as u32,
            lb_endpoints: make_lb_endpoints(endpoints),
        })
        .collect();

    let policy = (overprovisioning_factor > 0).then_some(Policy {
        overprovisioning_factor,
    });

    ClusterLoadAssignment {
        cluster_name: cluster_name.to_string(),
        endpoints,
        policy,
    }
}

fn make_lb_endpoints(endpoints: &[CheckServiceNode]) -> Vec<LbEndpoint> {
    endpoints
        .iter()
        .map(|ep| {
            let (health_status, weight) = normalize(ep);
            LbEndpoint {
                address: SocketAddress {
                    address: ep.address().to_string(),
                    port: ep.service.port,
                },
                health_status,
                load_balancing_weight: weight,
            }
        })
        .collect()
}
