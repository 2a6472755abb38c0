//! meshlet CLI
//!
//! Command-line interface for synthesizing endpoint resources offline and
//! for interacting with the meshlet daemon.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// meshlet - endpoint resource synthesizer for mesh sidecar proxies
#[derive(Parser, Debug)]
#[command(name = "meshlet")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Daemon API address
    #[arg(long, default_value = "http://localhost:8502", global = true)]
    api: String,

    /// Access token forwarded with synthesis requests
    #[arg(long, env = "MESHLET_TOKEN", default_value = "", global = true)]
    token: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize endpoint resources from a snapshot file, without a daemon
    Synthesize {
        /// Snapshot file (JSON)
        snapshot: PathBuf,

        /// Print resources as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the compiled discovery chain for a service
    Chain {
        /// Service name
        service: String,

        /// Datacenter the chain was compiled in
        #[arg(long)]
        dc: Option<String>,
    },

    /// Show the endpoint resources served by the daemon
    Endpoints {
        /// Print resources as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Publish a snapshot file to the daemon
    Push {
        /// Snapshot file (JSON)
        snapshot: PathBuf,
    },

    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let client = commands::ApiClient::new(&cli.api);

    match cli.command {
        Commands::Synthesize { snapshot, json } => {
            commands::synthesize(&snapshot, &cli.token, json)?;
        }
        Commands::Chain { service, dc } => {
            commands::chain(&client, service, dc).await?;
        }
        Commands::Endpoints { json } => {
            commands::endpoints(&client, &cli.token, json).await?;
        }
        Commands::Push { snapshot } => {
            commands::push(&client, &snapshot).await?;
        }
        Commands::Status => {
            commands::status(&client).await?;
        }
    }

    Ok(())
}
