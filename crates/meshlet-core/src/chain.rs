//! Compiled discovery chains
//!
//! A chain is the already-compiled graph describing how a logical service
//! name resolves to concrete routing targets. Compilation happens elsewhere;
//! this module only models the result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::MeshletError;

/// A concrete, resolvable destination within a discovery chain.
///
/// Targets key the per-target endpoint maps, so their string form
/// (`service,subset,namespace,datacenter`) is also their serialized form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiscoveryTarget {
    pub service: String,
    pub service_subset: String,
    pub namespace: String,
    pub datacenter: String,
}

impl DiscoveryTarget {
    /// Create a new target
    pub fn new(
        service: impl Into<String>,
        service_subset: impl Into<String>,
        namespace: impl Into<String>,
        datacenter: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            service_subset: service_subset.into(),
            namespace: namespace.into(),
            datacenter: datacenter.into(),
        }
    }
}

impl std::fmt::Display for DiscoveryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.service, self.service_subset, self.namespace, self.datacenter
        )
    }
}

impl FromStr for DiscoveryTarget {
    type Err = MeshletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        match parts.as_slice() {
            [service, subset, namespace, datacenter] if !service.is_empty() => {
                Ok(Self::new(*service, *subset, *namespace, *datacenter))
            }
            _ => Err(MeshletError::Config(format!(
                "invalid discovery target {:?}: expected service,subset,namespace,datacenter",
                s
            ))),
        }
    }
}

impl TryFrom<String> for DiscoveryTarget {
    type Error = MeshletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiscoveryTarget> for String {
    fn from(target: DiscoveryTarget) -> Self {
        target.to_string()
    }
}

/// The compiled form of a discovery chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledDiscoveryChain {
    /// Service the chain was compiled for
    pub service_name: String,
    /// Namespace of the service
    #[serde(default)]
    pub namespace: String,
    /// Datacenter the chain was compiled in
    pub datacenter: String,
    /// Protocol used by the chain (tcp, http, grpc, ...)
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Entry point of the graph; absent for an empty chain
    #[serde(default)]
    pub start_node: Option<DiscoveryGraphNode>,
    /// Every resolver node in the graph, keyed by the target it resolves
    #[serde(default)]
    pub group_resolver_nodes: BTreeMap<DiscoveryTarget, GroupResolverNode>,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

impl CompiledDiscoveryChain {
    /// Whether the chain is equivalent to plain, unsplit routing to the
    /// service itself
    pub fn is_default(&self) -> bool {
        match &self.start_node {
            None => true,
            Some(DiscoveryGraphNode::GroupResolver(node)) => {
                node.name == self.service_name && node.group_resolver.default
            }
            Some(_) => false,
        }
    }
}

/// A node of the compiled graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DiscoveryGraphNode {
    /// L7 routing by request attributes
    Router { name: String },
    /// Weighted traffic splitting
    Splitter { name: String },
    /// Terminal node resolving to a single target
    GroupResolver(GroupResolverNode),
}

impl DiscoveryGraphNode {
    /// Node name
    pub fn name(&self) -> &str {
        match self {
            DiscoveryGraphNode::Router { name } | DiscoveryGraphNode::Splitter { name } => name,
            DiscoveryGraphNode::GroupResolver(node) => &node.name,
        }
    }
}

/// A resolver node and the resolver it carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResolverNode {
    pub name: String,
    pub group_resolver: GroupResolver,
}

/// Resolution of one routing target, with optional failover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResolver {
    /// Synthesized from defaults rather than a resolver config entry
    #[serde(default)]
    pub default: bool,
    /// Target resolved by this node
    pub target: DiscoveryTarget,
    /// Failover policy, if configured
    #[serde(default)]
    pub failover: Option<DiscoveryFailover>,
}

/// Ordered failover targets for a resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryFailover {
    /// Targets to fail over to, most preferred first
    #[serde(default)]
    pub targets: Vec<DiscoveryTarget>,
    /// Overprovisioning factor; zero or negative means unset
    #[serde(default)]
    pub overprovisioning_factor: i32,
}
