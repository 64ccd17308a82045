//! Plugin gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                    PLUGIN GATEWAY                     │
//!                      │                                                       │
//!   Client Request     │  ┌─────────┐    ┌──────────────┐    ┌──────────────┐  │
//!   ───────────────────┼─▶│  http   │───▶│   registry   │───▶│   pipeline   │  │
//!                      │  │ server  │    │  path table  │    │    stages    │  │
//!                      │  └─────────┘    └──────▲───────┘    └──────┬───────┘  │
//!                      │                        │                   │          │
//!                      │                ┌───────┴──────┐    ┌───────▼───────┐  │
//!                      │                │  hot deploy  │    │ interceptors  │  │
//!                      │                │   watcher    │    │ security      │  │
//!                      │                └──────────────┘    │ service       │  │
//!   Client Response    │                                    └───────┬───────┘  │
//!   ◀──────────────────┼────────────────────────────────────────────┘          │
//!                      │                                                       │
//!                      │  config · observability · admin · lifecycle           │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use plugin_gateway::config::{load_config, GatewayConfig};
use plugin_gateway::lifecycle::{spawn_signal_handler, Gateway};
use plugin_gateway::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "plugin-gateway", version, about = "Pluggable HTTP request gateway")]
struct Args {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "plugin-gateway starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let gateway = Gateway::new(config)?;
    spawn_signal_handler(gateway.shutdown().clone());
    gateway.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
