//! AWattPrice Production Service
//!
//! Serves current electricity prices over HTTP, polls the upstream market
//! data API in the background and notifies subscribers when tomorrow's
//! prices drop below their threshold.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use awattprice_service::{
    initialize_logging, load_configuration, setup_signal_handlers, ServiceState,
};

/// AWattPrice backend service
#[derive(Parser, Debug)]
#[command(name = "awattprice", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short, env = "AWATTPRICE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let config = load_configuration(cli.config.as_deref())?;

    // Initialize logging; the guard flushes the log file on exit
    let _log_guard = initialize_logging(&config.logging)?;

    info!("Starting AWattPrice Service v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &cli.config {
        info!("Configuration loaded from {:?}", path);
    }

    // Setup signal handlers for graceful shutdown
    let shutdown = setup_signal_handlers().context("Failed to install signal handlers")?;
    info!("Signal handlers configured");

    let service_state = ServiceState::new(config).await.context("Failed to initialize service")?;
    info!("Service state initialized");

    info!("AWattPrice Service is running. Press Ctrl+C to shutdown gracefully.");
    service_state.run(shutdown).await?;

    info!("AWattPrice Service shutdown complete");
    Ok(())
}
