//! In-process HTTP request interception router (v1)
//!
//! Browser-style tabs register consumer sessions that serve requests from
//! their own route tables. An interception point sits between each tab
//! and the network, forwarding the calls a consumer claims and passing
//! every other call through.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────────┐
//!                         │                 INTERCEPT ROUTER                  │
//!                         │                                                   │
//!   HTTP call             │  ┌─────────┐    ┌──────────────┐    ┌──────────┐  │
//!   (x-client-id) ────────┼─▶│ gateway │───▶│ interception │───▶│ registry │  │
//!                         │  │ (axum)  │    │    point     │    │ tab→cons │  │
//!                         │  └────┬────┘    └──────┬───────┘    └──────────┘  │
//!                         │       │                │ broadcast bus            │
//!                         │       │                ▼                          │
//!                         │       │         ┌──────────────┐                  │
//!                         │       │         │   consumer   │ route table      │
//!                         │       │         │   session    │ + hooks          │
//!                         │       │         │ (dispatcher) │                  │
//!                         │       │         └──────────────┘                  │
//!                         │       ▼                                           │
//!   Upstream  ◀───────────┼── passthrough (no tab claims the call)            │
//!                         │                                                   │
//!                         │  config · observability · admin · lifecycle       │
//!                         └───────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use intercept_router::config::{load_config, RouterConfig};
use intercept_router::lifecycle::{signals, startup};
use intercept_router::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "intercept-router")]
#[command(about = "In-process HTTP request interception router", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "ROUTER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "intercept-router starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        config_path = ?args.config,
        admin_enabled = config.admin.enabled,
        upstream = ?config.passthrough.upstream,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let services = startup::start(config).await?;
    signals::spawn_signal_handler(services.shutdown.clone());

    let server = services.gateway();
    server.run(listener, services.shutdown.subscribe()).await?;

    services.stop().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
