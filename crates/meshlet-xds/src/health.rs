//! Health status and weight derivation for a single instance

use meshlet_core::{CheckServiceNode, HealthStatus};

use crate::resource::EndpointHealth;

/// Lowest weight the proxy accepts
pub const MIN_ENDPOINT_WEIGHT: u32 = 1;

/// Highest weight the proxy accepts
pub const MAX_ENDPOINT_WEIGHT: u32 = 128;

/// Derive the proxy-facing health status and weight of an instance.
///
/// Starts from the passing weight (or 1 without weight configuration). A
/// critical or maintenance check marks the instance unhealthy; a warning
/// check switches to the warning weight, the last one winning. A weight
/// below 1 means "send no traffic": it is reported as weight 1 and
/// unhealthy. Weights above 128 are capped without touching the status.
pub fn normalize(node: &CheckServiceNode) -> (EndpointHealth, u32) {
    let weights = node.service.weights;

    let mut status = EndpointHealth::Healthy;
    let mut weight = weights.map_or(1, |w| w.passing);

    for check in &node.checks {
        match check.status {
            // Critical instances are normally filtered out upstream of us.
            HealthStatus::Critical | HealthStatus::Maintenance => {
                status = EndpointHealth::Unhealthy;
            }
            HealthStatus::Warning => {
                if let Some(w) = weights {
                    weight = w.warning;
                }
            }
            HealthStatus::Passing => {}
        }
    }

    if weight < MIN_ENDPOINT_WEIGHT as i32 {
        return (EndpointHealth::Unhealthy, MIN_ENDPOINT_WEIGHT);
    }

    (status, (weight as u32).min(MAX_ENDPOINT_WEIGHT))
}
