//! Health-checked service instances as delivered by the watch layer

use serde::{Deserialize, Serialize};

/// Ordered set of instances backing one upstream or routing target
pub type CheckServiceNodes = Vec<CheckServiceNode>;

/// A service instance together with the node it runs on and its checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckServiceNode {
    /// Node hosting the instance
    pub node: Node,
    /// The registered service instance
    pub service: NodeService,
    /// Check results, in the order the catalog reported them
    #[serde(default)]
    pub checks: Vec<HealthCheck>,
}

impl CheckServiceNode {
    /// Address traffic should be sent to: the service address, or the node
    /// address when the service did not register one
    pub fn address(&self) -> &str {
        if self.service.address.is_empty() {
            &self.node.address
        } else {
            &self.service.address
        }
    }
}

/// Catalog node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node name
    #[serde(default)]
    pub node: String,
    /// Node address
    pub address: String,
    /// Datacenter the node belongs to
    #[serde(default)]
    pub datacenter: String,
}

/// Service instance registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeService {
    /// Instance ID
    #[serde(default)]
    pub id: String,
    /// Service name
    #[serde(default)]
    pub service: String,
    /// Service address; empty means "use the node address"
    #[serde(default)]
    pub address: String,
    /// Service port
    pub port: u16,
    /// Optional traffic weights
    #[serde(default)]
    pub weights: Option<Weights>,
}

/// Traffic weights keyed by the instance's aggregate check state.
///
/// Values are signed: zero or negative is a request to send no traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weights {
    pub passing: i32,
    pub warning: i32,
}

/// A single health check result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Check ID
    #[serde(default)]
    pub check_id: String,
    /// Human-readable check name
    #[serde(default)]
    pub name: String,
    /// Check status
    pub status: HealthStatus,
}

impl HealthCheck {
    /// Create a check with the given ID and status
    pub fn new(check_id: impl Into<String>, status: HealthStatus) -> Self {
        let check_id = check_id.into();
        Self {
            name: check_id.clone(),
            check_id,
            status,
        }
    }
}

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Passing,
    Warning,
    Critical,
    Maintenance,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Passing => write!(f, "passing"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Critical => write!(f, "critical"),
            HealthStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}
