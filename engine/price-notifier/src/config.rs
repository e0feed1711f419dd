//! Configuration for price-below notifications

use serde::{Deserialize, Serialize};

/// Configuration for the notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Dispatch notifications for new prices
    pub enabled: bool,

    /// SQLite database holding the registered tokens; no tokens without it
    pub database_url: Option<String>,

    /// Connection pool size
    pub max_connections: u32,

    /// Message localization keys
    pub messages: MessageConfig,
}

/// Localization keys resolved by the app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    pub title_loc_key: String,

    /// Body used when a single hour is below the threshold
    pub body_loc_key_single: String,

    /// Body used when several hours are below the threshold
    pub body_loc_key_multiple: String,

    /// Newer notifications replace older ones with the same id
    pub collapse_id: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_url: None,
            max_connections: 4,
            messages: MessageConfig::default(),
        }
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            title_loc_key: "general.priceGuard".to_string(),
            body_loc_key_single: "notifications.price_drops_below.body.sing".to_string(),
            body_loc_key_multiple: "notifications.price_drops_below.body.mult".to_string(),
            collapse_id: "collapse.priceDropsBelowNotification".to_string(),
        }
    }
}

impl NotifierConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("Notifier max_connections must be greater than 0".to_string());
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("sqlite:") {
                return Err(format!("Notifier database_url must be a sqlite url, got {}", url));
            }
        }

        Ok(())
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: NotifierConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
