//! AWattPrice Production Service Library
//!
//! Configuration loading, logging setup, signal handling and the wiring that
//! runs the price scheduler, the notification dispatcher and the HTTP API in
//! one process.

use anyhow::{Context, Result};
use std::path::Path;

pub mod config;
pub mod logging;
pub mod service;
pub mod signals;

pub use config::{LoggingConfig, ServiceConfig, ServiceSettings};
pub use logging::initialize_logging;
pub use service::ServiceState;
pub use signals::{setup_signal_handlers, wait_for_shutdown};

/// Load configuration from an optional file and environment variables
pub fn load_configuration(path: Option<&Path>) -> Result<ServiceConfig> {
    config::load_config(path).context("Failed to load service configuration")
}
