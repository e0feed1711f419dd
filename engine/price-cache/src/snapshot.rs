//! On-disk snapshot format
//!
//! Timestamps are stored as unix seconds and prices as decimal strings so a
//! stored snapshot loads back exactly as it was written.

use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use price_model::{PricePoint, PriceSnapshot, Region};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Current file format version
pub const FORMAT_VERSION: u32 = 1;

/// Snapshot as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub version: u32,
    pub region: Region,
    pub last_refreshed: DateTime<Utc>,
    pub prices: Vec<StoredPricePoint>,
}

/// Price point as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPricePoint {
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub marketprice: Decimal,
}

impl StoredSnapshot {
    pub fn from_snapshot(region: Region, snapshot: &PriceSnapshot) -> Self {
        Self {
            version: FORMAT_VERSION,
            region,
            last_refreshed: snapshot.last_refreshed(),
            prices: snapshot
                .points()
                .iter()
                .map(|point| StoredPricePoint {
                    start_timestamp: point.start_time.timestamp(),
                    end_timestamp: point.end_time.timestamp(),
                    marketprice: point.market_price,
                })
                .collect(),
        }
    }

    /// Convert back into a snapshot, checking it belongs to `region`
    pub fn into_snapshot(self, region: Region) -> Result<PriceSnapshot> {
        if self.version != FORMAT_VERSION {
            return Err(StorageError::corruption(format!(
                "unsupported format version {}",
                self.version
            )));
        }
        if self.region != region {
            return Err(StorageError::corruption(format!(
                "file holds {} prices, expected {}",
                self.region, region
            )));
        }

        let points = self
            .prices
            .into_iter()
            .map(|p| PricePoint::from_unix_seconds(p.start_timestamp, p.end_timestamp, p.marketprice))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| StorageError::corruption(e.to_string()))?;

        PriceSnapshot::new(points, self.last_refreshed)
            .map_err(|e| StorageError::corruption(e.to_string()))
    }
}
