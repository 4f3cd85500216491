//! # VPN Control Node
//!
//! Serves the VPN control methods over JSON-RPC on a pub/sub broker.
//!
//! ## Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load configuration (file, then `VC_*` environment, then flags)
//! 3. Initialize logging
//! 4. Restore the registry and start the request service
//! 5. Run until Ctrl+C, then shut down gracefully

use anyhow::{Context, Result};
use clap::Parser;
use node_runtime::{NodeConfig, NodeRuntime};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "vc-node", version, about = "VPN control service node")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "VC_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `service.name`.
    #[arg(long)]
    service_name: Option<String>,

    /// Overrides `storage.state_file`.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Overrides `log_level`; `RUST_LOG` still wins.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<NodeConfig> {
        let mut config = NodeConfig::load(self.config.as_deref()).context("Failed to load configuration")?;
        if let Some(name) = &self.service_name {
            config.service.name = name.clone();
        }
        if let Some(path) = &self.state_file {
            config.storage.state_file = Some(path.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .with_context(|| format!("Invalid log level '{default_level}'"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(&config.log_level)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %config.service.name,
        transport = ?config.broker.transport,
        "Starting vc-node"
    );

    let node = NodeRuntime::start(&config).await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    node.shutdown().await;
    Ok(())
}
