//! Service configuration management
//!
//! Layers, later ones winning: built-in defaults, an optional TOML file, then
//! environment variables such as `AWATTPRICE__FETCHER__PUBLICATION_HOUR=14`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use price_cache::CacheConfig;
use price_fetcher::FetcherConfig;
use price_gateway::GatewayConfig;
use price_notifier::NotifierConfig;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "AWATTPRICE";

/// Separator between nested keys in environment overrides
pub const ENV_SEPARATOR: &str = "__";

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Price cache configuration
    pub cache: CacheConfig,

    /// Upstream polling and refresh configuration
    pub fetcher: FetcherConfig,

    /// Price-below notification configuration
    pub notifier: NotifierConfig,

    /// HTTP server configuration
    pub gateway: GatewayConfig,

    /// Service-level settings
    pub service: ServiceSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,

    /// Price updates buffered between the refresher and the notifier
    pub update_channel_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,

    /// Directory for rotated log files (if None, logs to stdout only)
    pub directory: Option<PathBuf>,

    /// File name prefix of rotated log files
    pub file_prefix: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { shutdown_timeout_secs: 10, update_channel_capacity: 16 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            directory: None,
            file_prefix: "awattprice.log".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(anyhow!("Invalid log level: {}", self.logging.level)),
        }

        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            _ => return Err(anyhow!("Invalid log format: {}", self.logging.format)),
        }

        if self.service.update_channel_capacity == 0 {
            return Err(anyhow!("update_channel_capacity must be greater than 0"));
        }

        self.fetcher.validate().map_err(|e| anyhow!("Invalid fetcher configuration: {}", e))?;
        self.notifier.validate().map_err(|e| anyhow!("Invalid notifier configuration: {}", e))?;
        self.gateway.validate().map_err(|e| anyhow!("Invalid gateway configuration: {}", e))?;

        Ok(())
    }
}

/// Load configuration from an optional file and the process environment
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    load_config_with_env(path, None)
}

/// Load configuration, reading overrides from `env` instead of the process
/// environment when given
pub fn load_config_with_env(
    path: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<ServiceConfig> {
    let defaults = config::Config::try_from(&ServiceConfig::default())
        .context("Failed to build default configuration")?;
    let mut builder = config::Config::builder().add_source(defaults);

    if let Some(path) = path {
        tracing::debug!("Loading configuration from file: {:?}", path);
        builder = builder.add_source(
            config::File::from(path).format(config::FileFormat::Toml).required(true),
        );
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env),
    );

    let config: ServiceConfig = builder
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    config.validate()?;
    Ok(config)
}

/// Save configuration to a TOML file
pub fn save_config(config: &ServiceConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write configuration to {:?}", path))?;
    Ok(())
}
