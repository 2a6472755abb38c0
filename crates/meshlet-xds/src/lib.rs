//! meshlet-xds: Endpoint resource synthesis
//!
//! This crate turns a proxy configuration snapshot into the load
//! assignments a data-plane proxy consumes:
//! - Health status and weight normalization per instance
//! - Flat load assignments for plain upstreams and prepared queries
//! - Failover tier planning for compiled discovery chains
//! - Tiered load assignments with overprovisioning policy

pub mod endpoints;
pub mod error;
pub mod failover;
pub mod health;
pub mod load_assignment;
pub mod resource;

pub use endpoints::{cluster_name, endpoints_from_snapshot, UpstreamChain};
pub use error::{XdsError, XdsResult};
pub use failover::{plan_failover_tiers, FailoverPlan, DEFAULT_OVERPROVISIONING_FACTOR};
pub use health::{normalize, MAX_ENDPOINT_WEIGHT, MIN_ENDPOINT_WEIGHT};
pub use load_assignment::{make_load_assignment, make_load_assignment_for_discovery_chain};
pub use resource::{
    ClusterLoadAssignment, EndpointHealth, LbEndpoint, LocalityLbEndpoints, Policy, SocketAddress,
};
