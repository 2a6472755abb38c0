//! Failover tier planning
//!
//! Turns a resolver's failover definition into the ordered endpoint sets
//! of a tiered load assignment. Tier 0 is always the target's own
//! endpoints; failover targets follow in declared order.

use meshlet_core::{CheckServiceNode, CheckServiceNodes, DiscoveryTarget, GroupResolver};
use std::collections::BTreeMap;
use tracing::debug;

/// Overprovisioning factor used when failover is configured without one.
///
/// Large enough that the proxy only shifts traffic to lower tiers once
/// (nearly) no endpoint in the higher tier is healthy.
pub const DEFAULT_OVERPROVISIONING_FACTOR: u32 = 100_000;

/// Ordered endpoint tiers for one routing target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverPlan<'a> {
    /// Endpoint sets by priority
    pub tiers: Vec<&'a [CheckServiceNode]>,
    /// Zero means no policy should be emitted
    pub overprovisioning_factor: u32,
}

/// Plan the priority tiers for `target`.
///
/// Returns `None` when the target's own endpoints have not arrived yet.
/// Failover targets without endpoints are skipped, so priorities always
/// number the emitted tiers contiguously.
pub fn plan_failover_tiers<'a>(
    target: &DiscoveryTarget,
    resolver: &GroupResolver,
    endpoint_map: &'a BTreeMap<DiscoveryTarget, CheckServiceNodes>,
) -> Option<FailoverPlan<'a>> {
    let primary = endpoint_map.get(target)?;

    let failover = match &resolver.failover {
        Some(failover) if !failover.targets.is_empty() => failover,
        _ => {
            return Some(FailoverPlan {
                tiers: vec![primary.as_slice()],
                overprovisioning_factor: 0,
            })
        }
    };

    let overprovisioning_factor = if failover.overprovisioning_factor > 0 {
        failover.overprovisioning_factor as u32
    } else {
        DEFAULT_OVERPROVISIONING_FACTOR
    };

    let mut tiers = Vec::with_capacity(failover.targets.len() + 1);
    tiers.push(primary.as_slice());

    for fail_target in &failover.targets {
        match endpoint_map.get(fail_target) {
            Some(endpoints) => tiers.push(endpoints.as_slice()),
            None => {
                debug!(
                    routing_target = %target,
                    failover_target = %fail_target,
                    "Failover target endpoints not ready, skipping tier"
                );
            }
        }
    }

    Some(FailoverPlan {
        tiers,
        overprovisioning_factor,
    })
}
