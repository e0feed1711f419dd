//! # Price Cache
//!
//! Local file-based cache for the last known price snapshot of each region.
//!
//! ## Layout
//!
//! Everything lives in `<data_dir>/price_data/`:
//!
//! - `awattar-data-{region}.json`: the snapshot, replaced atomically on every store
//! - `update-ts-{region}.info`: unix seconds of the last successful upstream poll
//!
//! ## Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use price_cache::create_price_cache;
//! use price_model::{Decimal, PricePoint, PriceSnapshot, Region};
//! use tempfile::TempDir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = TempDir::new()?;
//!     let cache = create_price_cache(temp_dir.path())?;
//!
//!     let hour = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
//!     let snapshot = PriceSnapshot::new(vec![PricePoint::new(hour, Decimal::new(4200, 2))], Utc::now())?;
//!     cache.store(Region::DE, &snapshot).await?;
//!
//!     assert_eq!(cache.load(Region::DE).await?, Some(snapshot));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod snapshot;
pub mod store;

pub use config::CacheConfig;
pub use error::{Result, StorageError};
pub use store::PriceCache;

/// Create a price cache rooted at `data_dir` with default file names
pub fn create_price_cache(data_dir: impl Into<std::path::PathBuf>) -> Result<PriceCache> {
    PriceCache::new(CacheConfig::new(data_dir))
}
