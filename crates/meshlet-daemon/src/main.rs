//! meshlet daemon
//!
//! Serves endpoint resources synthesized from the published snapshot.

use anyhow::Context;
use clap::Parser;
use meshlet_api::{create_router, AppState};
use meshlet_core::{ConfigSnapshot, DaemonConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// meshletd - endpoint resource synthesizer for mesh sidecar proxies
#[derive(Parser, Debug)]
#[command(name = "meshletd")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the API server
    #[arg(long)]
    address: Option<String>,

    /// Port for the REST API server
    #[arg(long)]
    port: Option<u16>,

    /// Snapshot to serve at startup (JSON)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_logging(level: &str, format: &str) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_target(false);

    let result = if format == "json" {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.context("Failed to set subscriber")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DaemonConfig::from_file(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(address) = args.address {
        config.api.address = address;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(snapshot) = args.snapshot {
        config.snapshot.path = Some(snapshot);
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging.level, &config.logging.format)?;

    info!("Starting meshlet daemon v{}", env!("CARGO_PKG_VERSION"));

    let snapshot = match &config.snapshot.path {
        Some(path) => {
            let snapshot = ConfigSnapshot::from_json_file(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            info!(
                path = %path.display(),
                proxy = %snapshot.proxy_id,
                upstreams = snapshot.proxy.upstreams.len(),
                "Loaded initial snapshot"
            );
            Some(snapshot)
        }
        None => None,
    };

    let state = Arc::new(AppState::new(snapshot));
    let router = create_router(state, &config.api);

    let addr: SocketAddr = format!("{}:{}", config.api.address, config.api.port)
        .parse()
        .context("Invalid address")?;

    info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router).await.context("Server error")?;

    Ok(())
}
