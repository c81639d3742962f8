//! Tapedeck Audio Player (tapedeck-ap) - Main entry point
//!
//! Loads configuration and the song library, starts the playback coordinator
//! on the clock engine and serves the HTTP/SSE control API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tapedeck_ap::api::{self, AppContext};
use tapedeck_ap::audio::ClockEngine;
use tapedeck_ap::config::{Config, Overrides};
use tapedeck_ap::{PlaybackCoordinator, SharedState};
use tapedeck_common::config::{resolve_config_path, TomlConfig, CONFIG_ENV_VAR};
use tapedeck_common::Library;

/// Command-line arguments for tapedeck-ap
#[derive(Parser, Debug)]
#[command(name = "tapedeck-ap")]
#[command(about = "Playlist playback service for Tapedeck")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TAPEDECK_PORT")]
    port: Option<u16>,

    /// Config file (overrides TAPEDECK_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Library file with songs and playlists
    #[arg(short, long, env = "TAPEDECK_LIBRARY")]
    library: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing exists; its own log lines are dropped
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let file = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load config file")?;
    let config = Config::resolve(
        Overrides {
            port: args.port,
            library_file: args.library,
            log_level: args.log_level,
        },
        file,
    )
    .context("Invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tapedeck Audio Player on port {}", config.port);
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file; using defaults"),
    }

    let library = match &config.library_file {
        Some(path) => Library::load(path)
            .with_context(|| format!("Failed to load library {}", path.display()))?,
        None => {
            warn!("No library file configured; starting with an empty library");
            Library::new()
        }
    };
    let library = Arc::new(library);

    let engine = Arc::new(ClockEngine::new(
        config.engine.clone(),
        library.durations_by_url(),
    ));
    let state = Arc::new(SharedState::new());
    let coordinator = Arc::new(PlaybackCoordinator::new(
        engine,
        library.clone(),
        Arc::clone(&state),
    ));

    let ctx = AppContext {
        state,
        coordinator: Arc::clone(&coordinator),
        directory: library,
    };

    api::run(config.bind_addr(), ctx, shutdown_signal())
        .await
        .context("Server error")?;

    coordinator.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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
