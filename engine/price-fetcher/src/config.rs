use price_model::Region;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for polling the upstream price API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Upstream endpoints per region
    pub upstream: UpstreamConfig,

    /// Local hour (Europe/Berlin) after which next-day prices may be published
    pub publication_hour: u32,

    /// Minimum seconds between two upstream polls of one region
    pub cooldown_secs: u64,

    /// Seconds a follower waits for the leader's refresh to finish
    pub lock_timeout_secs: u64,

    /// Retry configuration for downloads
    pub retry: RetryConfig,

    /// Scheduler configuration
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Market data endpoint for Germany
    pub de_url: String,

    /// Market data endpoint for Austria
    pub at_url: String,

    /// Timeout of a single download attempt in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound for a single retry delay in milliseconds
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,

    /// Deadline for all attempts together in seconds
    pub total_deadline_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Enable the background poll loop
    pub enabled: bool,

    /// Seconds between two scheduler ticks
    pub poll_interval_secs: u64,

    /// Regions polled by the scheduler
    pub regions: Vec<Region>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            publication_hour: 13,
            cooldown_secs: 60,
            lock_timeout_secs: 10,
            retry: RetryConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            de_url: "https://api.awattar.de/v1/marketdata/".to_string(),
            at_url: "https://api.awattar.at/v1/marketdata/".to_string(),
            timeout_secs: 7,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 1_000,
            max_delay_ms: 8_000,
            backoff_multiplier: 2.0,
            total_deadline_secs: 20,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true, poll_interval_secs: 60, regions: Region::ALL.to_vec() }
    }
}

impl UpstreamConfig {
    /// Endpoint of a region
    pub fn url_for(&self, region: Region) -> &str {
        match region {
            Region::DE => &self.de_url,
            Region::AT => &self.at_url,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn total_deadline(&self) -> Duration {
        Duration::from_secs(self.total_deadline_secs)
    }

    /// Delay following `delay` under exponential backoff, capped at `max_delay`
    pub fn next_delay(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.backoff_multiplier.max(1.0)).min(self.max_delay())
    }
}

impl FetcherConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_secs as i64)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.poll_interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.publication_hour >= 24 {
            return Err(format!(
                "publication_hour must be below 24, got {}",
                self.publication_hour
            ));
        }

        for region in Region::ALL {
            if self.upstream.url_for(region).trim().is_empty() {
                return Err(format!("Upstream URL for region {} is missing", region));
            }
        }

        if self.upstream.timeout_secs == 0 {
            return Err("Upstream timeout_secs must be greater than 0".to_string());
        }

        if self.retry.max_attempts == 0 {
            return Err("Retry max_attempts must be greater than 0".to_string());
        }

        if self.retry.total_deadline_secs == 0 {
            return Err("Retry total_deadline_secs must be greater than 0".to_string());
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err("Retry backoff_multiplier must be at least 1.0".to_string());
        }

        if self.scheduler.enabled && self.scheduler.poll_interval_secs == 0 {
            return Err("Scheduler poll_interval_secs must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: FetcherConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
