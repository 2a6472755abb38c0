//! CLI commands implementation

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use meshlet_core::ConfigSnapshot;
use meshlet_xds::{endpoints_from_snapshot, ClusterLoadAssignment};
use serde::Deserialize;
use std::path::Path;

/// Header carrying the access token
const TOKEN_HEADER: &str = "x-mesh-token";

/// API client for communicating with the daemon
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of the discovery chain for `service`, with the name encoded as
    /// a single path segment
    pub fn chain_url(&self, service: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.url("/v1/discovery/chain"))
            .with_context(|| format!("Invalid API address {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid API address {}", self.base_url))?
            .push(service);
        Ok(url)
    }
}

/// Fail with the daemon's message unless the response is a success
async fn ensure_success(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error = response.text().await.unwrap_or_default();
    bail!("Failed to {} ({}): {}", action, status, error)
}

/// Status response
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub snapshot_loaded: bool,
    pub proxy_id: Option<String>,
    pub upstreams: usize,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Load a snapshot file and synthesize its endpoint resources
pub fn synthesize_file(path: &Path, token: &str) -> Result<Vec<ClusterLoadAssignment>> {
    let snapshot = ConfigSnapshot::from_json_file(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    Ok(endpoints_from_snapshot(Some(&snapshot), token)?)
}

/// Synthesize endpoint resources locally
pub fn synthesize(path: &Path, token: &str, json: bool) -> Result<()> {
    let resources = synthesize_file(path, token)?;
    print_resources(&resources, json)
}

/// Show a compiled discovery chain
pub async fn chain(client: &ApiClient, service: String, dc: Option<String>) -> Result<()> {
    let mut request = client.client.get(client.chain_url(&service)?);
    if let Some(dc) = dc {
        request = request.query(&[("dc", dc)]);
    }

    let response = ensure_success(request.send().await?, "read discovery chain").await?;
    let chain: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&chain)?);

    Ok(())
}

/// Show endpoint resources served by the daemon
pub async fn endpoints(client: &ApiClient, token: &str, json: bool) -> Result<()> {
    let response = client
        .client
        .get(client.url("/v1/endpoints"))
        .header(TOKEN_HEADER, token)
        .send()
        .await?;

    let response = ensure_success(response, "get endpoints").await?;
    let resources: Vec<ClusterLoadAssignment> = response.json().await?;
    print_resources(&resources, json)
}

/// Publish a snapshot to the daemon
pub async fn push(client: &ApiClient, path: &Path) -> Result<()> {
    let snapshot = ConfigSnapshot::from_json_file(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;

    let response = client
        .client
        .put(client.url("/v1/snapshot"))
        .json(&snapshot)
        .send()
        .await?;
    ensure_success(response, "publish snapshot").await?;

    println!(
        "Snapshot for '{}' published ({} upstreams)",
        snapshot.proxy_id,
        snapshot.proxy.upstreams.len()
    );

    Ok(())
}

/// Show daemon status
pub async fn status(client: &ApiClient) -> Result<()> {
    let response = client.client.get(client.url("/v1/status")).send().await?;
    let status: StatusResponse = ensure_success(response, "get status").await?.json().await?;

    println!("meshlet v{}", status.version);
    println!();
    match (status.snapshot_loaded, status.loaded_at) {
        (true, Some(loaded_at)) => {
            println!(
                "Snapshot: {} (loaded {})",
                status.proxy_id.unwrap_or_default(),
                loaded_at.to_rfc3339()
            );
            println!("Upstreams: {}", status.upstreams);
        }
        _ => println!("Snapshot: none"),
    }

    Ok(())
}

/// Helper to print resources as JSON or as a table
fn print_resources(resources: &[ClusterLoadAssignment], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(resources)?);
        return Ok(());
    }

    if resources.is_empty() {
        println!("No endpoint resources");
        return Ok(());
    }

    for line in format_resources(resources) {
        println!("{}", line);
    }
    Ok(())
}

fn format_resources(resources: &[ClusterLoadAssignment]) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{:<40} {:<8} {:<24} {:<10} {:<6}",
            "CLUSTER", "PRIORITY", "ADDRESS", "HEALTH", "WEIGHT"
        ),
        "-".repeat(92),
    ];

    for cla in resources {
        for tier in &cla.endpoints {
            for ep in &tier.lb_endpoints {
                lines.push(format!(
                    "{:<40} {:<8} {:<24} {:<10} {:<6}",
                    cla.cluster_name,
                    tier.priority,
                    ep.address.to_string(),
                    ep.health_status.to_string(),
                    ep.load_balancing_weight
                ));
            }
        }
        if let Some(policy) = cla.policy {
            lines.push(format!(
                "{:<40} overprovisioning factor {}",
                cla.cluster_name, policy.overprovisioning_factor
            ));
        }
    }

    lines
}
