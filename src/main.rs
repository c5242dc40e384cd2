//! Ingress guard (v1)
//!
//! Serves the guard's own endpoints behind the full screening stack.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ trace → request id → timeout/limits → translator
//!                       → session → screening pipeline → routes
//!
//!     Screening pipeline:
//!         sanitize → SQL → NoSQL → command → prototype → SSRF → CSRF
//!
//!     Background:
//!         config watcher → pattern table swap
//!         CSRF token sweeper
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ingress_guard::config::watcher::ConfigWatcher;
use ingress_guard::config::{load_config, GuardConfig};
use ingress_guard::lifecycle::{signals, Shutdown};
use ingress_guard::observability::{logging, metrics};
use ingress_guard::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "ingress-guard", version, about = "Request screening gateway")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => GuardConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("ingress-guard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = config.environment.as_str(),
        max_depth = config.pipeline.max_depth,
        request_timeout_secs = config.pipeline.request_timeout_secs,
        "Configuration loaded"
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

    // The watcher must outlive the server for reloads to keep flowing.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run().context("starting config watcher")?), updates)
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .with_context(|| format!("binding {}", config.listener.bind_address))?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        signals::trigger_on_signal(&shutdown).await;
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
