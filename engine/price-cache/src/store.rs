//! File-backed price cache with atomic replacement

use crate::config::CacheConfig;
use crate::error::{Result, StorageError};
use crate::snapshot::StoredSnapshot;
use chrono::{DateTime, Utc};
use price_model::{PriceSnapshot, Region};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Local cache of the last known snapshot per region.
///
/// Readers never see a partially written file: every write goes to a
/// temporary file in the same directory which is then renamed over the target.
#[derive(Debug, Clone)]
pub struct PriceCache {
    config: CacheConfig,
}

impl PriceCache {
    /// Create a new cache, creating its directory if missing
    pub fn new(config: CacheConfig) -> Result<Self> {
        std::fs::create_dir_all(config.price_data_dir()).map_err(StorageError::Io)?;
        tracing::debug!("Price cache initialized at: {:?}", config.price_data_dir());
        Ok(Self { config })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Load the stored snapshot of a region.
    ///
    /// Returns `None` if nothing is stored or the stored file can't be parsed.
    /// Only unexpected I/O errors are returned as errors.
    pub async fn load(&self, region: Region) -> Result<Option<PriceSnapshot>> {
        let path = self.config.snapshot_file(region);
        let Some(raw) = read_optional(&path).await? else {
            tracing::debug!("No stored {} price data at {:?}", region, path);
            return Ok(None);
        };

        if raw.trim().is_empty() {
            tracing::warn!("Stored {} price data at {:?} is empty", region, path);
            return Ok(None);
        }

        let stored: StoredSnapshot = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Stored {} price data at {:?} is no valid json: {}", region, path, e);
                return Ok(None);
            }
        };

        match stored.into_snapshot(region) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!("Ignoring stored {} price data at {:?}: {}", region, path, e);
                Ok(None)
            }
        }
    }

    /// Atomically replace the stored snapshot of a region
    pub async fn store(&self, region: Region, snapshot: &PriceSnapshot) -> Result<()> {
        let path = self.config.snapshot_file(region);
        let stored = StoredSnapshot::from_snapshot(region, snapshot);
        let contents = serde_json::to_vec(&stored).map_err(StorageError::Serialization)?;

        self.write_atomic(&path, &contents).await?;

        tracing::info!(
            "Stored {} price data to {:?} ({} points, refreshed {})",
            region,
            path,
            snapshot.len(),
            snapshot.last_refreshed()
        );
        Ok(())
    }

    /// Remember when the upstream API was last polled successfully
    pub async fn record_poll(&self, region: Region, at: DateTime<Utc>) -> Result<()> {
        let path = self.config.poll_stamp_file(region);
        self.write_atomic(&path, at.timestamp().to_string().as_bytes()).await
    }

    /// Time of the last successful upstream poll; `None` if unknown
    pub async fn last_poll(&self, region: Region) -> Result<Option<DateTime<Utc>>> {
        let path = self.config.poll_stamp_file(region);
        let Some(raw) = read_optional(&path).await? else {
            return Ok(None);
        };

        let parsed = raw.trim().parse::<i64>().ok().and_then(|secs| DateTime::from_timestamp(secs, 0));
        if parsed.is_none() {
            tracing::warn!("Ignoring unreadable poll stamp at {:?}: {:?}", path, raw);
        }
        Ok(parsed)
    }

    // Private methods

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let dir = self.config.price_data_dir();
        tokio::fs::create_dir_all(&dir).await.map_err(StorageError::Io)?;

        let tmp_path = temp_path_for(path);
        let result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(contents).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(e));
        }
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or("price-cache");
    path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()))
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}
