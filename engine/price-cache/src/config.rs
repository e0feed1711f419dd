//! Configuration for the price cache

use price_model::Region;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the subdirectory holding cached price data
pub const PRICE_DATA_SUBDIR: &str = "price_data";

/// Configuration for the price cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Base data directory; price files go into its `price_data` subdirectory
    pub data_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data") }
    }
}

impl CacheConfig {
    /// Create a new configuration with a custom data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    /// Directory holding snapshot and poll stamp files
    pub fn price_data_dir(&self) -> PathBuf {
        self.data_dir.join(PRICE_DATA_SUBDIR)
    }

    /// Snapshot file of a region
    pub fn snapshot_file(&self, region: Region) -> PathBuf {
        self.price_data_dir().join(format!("awattar-data-{}.json", region.as_lower()))
    }

    /// Poll stamp file of a region
    pub fn poll_stamp_file(&self, region: Region) -> PathBuf {
        self.price_data_dir().join(format!("update-ts-{}.info", region.as_lower()))
    }
}
