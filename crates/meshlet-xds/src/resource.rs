//! Endpoint resources consumed by the data-plane proxy
//!
//! Field names and numeric ranges follow the proxy's endpoint discovery
//! schema: weights are in `[1, 128]`, tiers are addressed by
//! `(cluster_name, priority)`.

use serde::{Deserialize, Serialize};

/// Load assignment for one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterLoadAssignment {
    pub cluster_name: String,
    /// One entry per priority tier
    pub endpoints: Vec<LocalityLbEndpoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
}

/// Endpoints sharing a priority tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityLbEndpoints {
    /// 0 is the primary tier; higher values are only used on failover
    pub priority: u32,
    pub lb_endpoints: Vec<LbEndpoint>,
}

/// A single weighted, health-tagged endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbEndpoint {
    pub address: SocketAddress,
    pub health_status: EndpointHealth,
    pub load_balancing_weight: u32,
}

/// Host and port of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketAddress {
    pub address: String,
    pub port: u16,
}

impl std::fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Health status as understood by the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointHealth {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for EndpointHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointHealth::Healthy => write!(f, "HEALTHY"),
            EndpointHealth::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

/// Cluster-wide load balancing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub overprovisioning_factor: u32,
}
