//! Proxy configuration snapshots
//!
//! A snapshot is the caller's materialized view of everything a proxy's
//! endpoint resources depend on. It is read-only for the duration of a
//! synthesis call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{CheckServiceNodes, CompiledDiscoveryChain, DiscoveryTarget, MeshletError};

/// Role of the service a snapshot was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    /// Plain service, no proxy
    Typical,
    /// Sidecar proxy fronting a single service
    ConnectProxy,
    /// Gateway between datacenters
    MeshGateway,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Typical => write!(f, "typical"),
            ServiceKind::ConnectProxy => write!(f, "connect-proxy"),
            ServiceKind::MeshGateway => write!(f, "mesh-gateway"),
        }
    }
}

/// What an upstream's destination name refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamDestType {
    #[default]
    Service,
    PreparedQuery,
}

impl std::fmt::Display for UpstreamDestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamDestType::Service => write!(f, "service"),
            UpstreamDestType::PreparedQuery => write!(f, "prepared_query"),
        }
    }
}

/// A service dependency configured on a proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upstream {
    #[serde(default)]
    pub destination_type: UpstreamDestType,
    #[serde(default)]
    pub destination_namespace: String,
    pub destination_name: String,
    /// Datacenter override; empty means the proxy's own datacenter
    #[serde(default)]
    pub datacenter: String,
    #[serde(default)]
    pub local_bind_port: u16,
}

impl Upstream {
    /// Create a service upstream
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            destination_type: UpstreamDestType::Service,
            destination_namespace: String::new(),
            destination_name: name.into(),
            datacenter: String::new(),
            local_bind_port: 0,
        }
    }

    /// Create a prepared query upstream
    pub fn prepared_query(name: impl Into<String>) -> Self {
        Self {
            destination_type: UpstreamDestType::PreparedQuery,
            ..Self::service(name)
        }
    }

    /// Stable key for this upstream within a snapshot's maps
    pub fn identifier(&self) -> String {
        let mut name = self.destination_name.clone();
        if self.destination_type != UpstreamDestType::PreparedQuery
            && !self.destination_namespace.is_empty()
            && self.destination_namespace != "default"
        {
            name = format!("{}/{}", self.destination_namespace, name);
        }
        if !self.datacenter.is_empty() {
            name.push_str("?dc=");
            name.push_str(&self.datacenter);
        }

        match self.destination_type {
            UpstreamDestType::Service => name,
            UpstreamDestType::PreparedQuery => format!("{}:{}", self.destination_type, name),
        }
    }
}

/// Proxy registration data the snapshot depends on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectProxyConfig {
    /// Service the proxy fronts
    #[serde(default)]
    pub destination_service_name: String,
    /// Configured upstreams, in declaration order
    #[serde(default)]
    pub upstreams: Vec<Upstream>,
}

/// Snapshot of everything needed to generate a proxy's endpoint resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub kind: ServiceKind,
    #[serde(default)]
    pub proxy_id: String,
    pub datacenter: String,
    #[serde(default)]
    pub proxy: ConnectProxyConfig,
    /// Flat endpoint sets by upstream identifier
    #[serde(default)]
    pub upstream_endpoints: BTreeMap<String, CheckServiceNodes>,
    /// Compiled chains by upstream identifier
    #[serde(default)]
    pub discovery_chain: BTreeMap<String, CompiledDiscoveryChain>,
    /// Per-target endpoint sets by upstream identifier
    #[serde(default)]
    pub watched_upstream_endpoints: BTreeMap<String, BTreeMap<DiscoveryTarget, CheckServiceNodes>>,
}

impl ConfigSnapshot {
    /// Create an empty snapshot
    pub fn new(kind: ServiceKind, datacenter: impl Into<String>) -> Self {
        Self {
            kind,
            proxy_id: String::new(),
            datacenter: datacenter.into(),
            proxy: ConnectProxyConfig::default(),
            upstream_endpoints: BTreeMap::new(),
            discovery_chain: BTreeMap::new(),
            watched_upstream_endpoints: BTreeMap::new(),
        }
    }

    /// Load a snapshot from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, MeshletError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Find a compiled chain by the service it was compiled for
    pub fn find_chain(
        &self,
        service_name: &str,
        datacenter: Option<&str>,
    ) -> Option<&CompiledDiscoveryChain> {
        self.discovery_chain.values().find(|chain| {
            chain.service_name == service_name
                && datacenter.map_or(true, |dc| chain.datacenter == dc)
        })
    }
}
