//! PiSong Audio Pipeline (pisong-ap) - Main entry point
//!
//! Resolves configuration, initializes logging and serves the HTTP and
//! WebSocket API until Ctrl+C or SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pisong_ap::api::{self, AppContext};
use pisong_ap::config::{Args, Config};
use pisong_ap::digits::PiSpigot;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    let config = Config::resolve(&args).context("Failed to resolve configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter(&config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PiSong Audio Pipeline v{}", env!("CARGO_PKG_VERSION"));
    match &config.config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using defaults"),
    }
    info!(
        "Synthesis: {} Hz, attack {}s, decay {}s, max {} digits",
        config.renderer.sample_rate, config.renderer.attack, config.renderer.decay, config.max_digits
    );

    let ctx = AppContext::new(config, Arc::new(PiSpigot::new()));

    api::run(ctx, shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Filter directive for a configured level
///
/// A bare level (`"debug"`) applies to this service and the HTTP layer; a
/// full directive (`"pisong_ap=trace,hyper=info"`) is used as given.
fn log_filter(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("pisong_ap={},pisong_common={},tower_http={}", level, level, level)
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
