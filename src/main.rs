//! API gateway.
//!
//! A reverse-proxy gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                     API GATEWAY                      │
//!                         │                                                      │
//!   Client Request        │  ┌──────────┐   ┌──────────┐   ┌────────────────┐    │
//!   ──────────────────────┼─▶│   http   │──▶│   rate   │──▶│    circuit     │    │
//!                         │  │  server  │   │  limiter │   │    breaker     │    │
//!                         │  └──────────┘   └──────────┘   └───────┬────────┘    │
//!                         │                                        ▼             │
//!                         │  ┌──────────┐   ┌──────────┐   ┌────────────────┐    │
//!                         │  │  retry + │◀──│ response │◀──│ load_balancer  │    │
//!                         │  │ timeout  │   │  cache   │   │ (round robin)  │    │
//!                         │  └────┬─────┘   └──────────┘   └────────────────┘    │
//!                         │       │                                ▲             │
//!                         │       ▼                                │             │
//!                         │  ┌──────────┐                   ┌──────┴─────────┐   │
//!                         │  │ forward  │───────────────────┼──▶ backends    │   │
//!                         │  └──────────┘                   │  health monitor│   │
//!                         │                                 └────────────────┘   │
//!                         │  Cross-cutting: config + reload, admin API,          │
//!                         │  observability, lifecycle                            │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use api_gateway::admin;
use api_gateway::config::loader::{load_config, load_from_env};
use api_gateway::config::watcher::ConfigWatcher;
use api_gateway::lifecycle::{signals, Shutdown};
use api_gateway::observability::{logging, metrics};
use api_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Reverse-proxy API gateway", long_about = None)]
struct Args {
    /// Path to a TOML config file. Without it, defaults plus environment are used.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path),
        None => load_from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    logging::init(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        "api-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();

    // The watcher handle must outlive the server for reloads to keep flowing.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (Some(handle), updates),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    (None, updates)
                }
            }
        }
        None => (None, tokio::sync::mpsc::unbounded_channel().1),
    };

    let server = GatewayServer::new(config.clone())?;

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let router = admin::setup_admin_router(server.pipeline(), &config.admin.api_key);
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, router, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server_shutdown = shutdown.subscribe();
    let mut server_task = tokio::spawn(server.run(listener, config_updates, server_shutdown));

    let finished = tokio::select! {
        _ = signals::wait_for_signal() => {
            shutdown.trigger();
            (&mut server_task).await
        }
        result = &mut server_task => {
            shutdown.trigger();
            result
        }
    };

    match finished {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Gateway server failed"),
        Err(e) => tracing::error!(error = %e, "Gateway server task panicked"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
