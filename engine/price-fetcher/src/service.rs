//! Request-path entry point for current prices

use crate::error::RefreshError;
use crate::refresher::{RefreshKind, Refresher};
use price_model::{PriceSnapshot, Region};
use std::sync::Arc;
use tracing::debug;

/// Prices of a region as handed to callers
#[derive(Debug, Clone)]
pub struct CurrentPrices {
    pub region: Region,
    pub snapshot: Arc<PriceSnapshot>,

    /// Set when a refresh was run for this request
    pub refresh: Option<RefreshKind>,
}

impl CurrentPrices {
    /// Whether this request downloaded new prices
    pub fn is_updated(&self) -> bool {
        self.refresh == Some(RefreshKind::Updated)
    }
}

/// Serves cached prices and refreshes them when they are due
#[derive(Clone)]
pub struct PriceService {
    refresher: Arc<Refresher>,
}

impl PriceService {
    pub fn new(refresher: Arc<Refresher>) -> Self {
        Self { refresher }
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    /// Best available prices for a region, refreshing first if they are due
    pub async fn current_prices(&self, region: Region) -> Result<CurrentPrices, RefreshError> {
        let (cached, decision) = self.refresher.inspect(region).await;
        debug!("Freshness of {} prices: {:?}", region, decision);

        match cached {
            Some(snapshot) if !decision.needs_refresh() => Ok(CurrentPrices {
                region,
                snapshot: Arc::new(snapshot),
                refresh: None,
            }),
            _ => {
                let outcome = self.refresher.refresh(region).await?;
                Ok(CurrentPrices { region, snapshot: outcome.snapshot, refresh: Some(outcome.kind) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherConfig;
    use crate::error::FetchError;
    use crate::upstream::PriceSource;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use price_cache::{CacheConfig, PriceCache};
    use price_model::time::local_day_start;
    use price_model::{Decimal, FixedClock, PricePoint};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Upstream always answering with two days of prices
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        async fn fetch(
            &self,
            _region: Region,
            start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<PricePoint>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..48).map(|h| PricePoint::new(start + Duration::hours(h), Decimal::new(42, 0))).collect())
        }
    }

    fn setup(now: DateTime<Utc>) -> (TempDir, Arc<CountingSource>, Arc<FixedClock>, PriceService) {
        let temp_dir = TempDir::new().unwrap();
        let cache = PriceCache::new(CacheConfig::new(temp_dir.path())).unwrap();
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let clock = Arc::new(FixedClock::new(now));
        let refresher = Refresher::new(&FetcherConfig::default(), source.clone(), cache, clock.clone());
        (temp_dir, source, clock, PriceService::new(Arc::new(refresher)))
    }

    // 14:00 in Berlin
    fn afternoon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_first_request_downloads() {
        let (_dir, source, _clock, service) = setup(afternoon());

        let prices = service.current_prices(Region::DE).await.unwrap();

        assert!(prices.is_updated());
        assert_eq!(prices.region, Region::DE);
        assert_eq!(prices.snapshot.len(), 48);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_covered_prices_are_served_from_cache() {
        let (_dir, source, clock, service) = setup(afternoon());
        service.current_prices(Region::DE).await.unwrap();

        clock.advance(Duration::minutes(30));
        let prices = service.current_prices(Region::DE).await.unwrap();

        assert_eq!(prices.refresh, None);
        assert_eq!(prices.snapshot.last_refreshed(), afternoon());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_next_day_refreshes_after_publication() {
        let (_dir, source, clock, service) = setup(afternoon());
        service.current_prices(Region::DE).await.unwrap();

        // next morning: before publication, yesterday's download still serves
        clock.set(Utc.with_ymd_and_hms(2024, 3, 16, 8, 0, 0).unwrap());
        assert_eq!(service.current_prices(Region::DE).await.unwrap().refresh, None);

        clock.set(Utc.with_ymd_and_hms(2024, 3, 16, 12, 15, 0).unwrap());
        let prices = service.current_prices(Region::DE).await.unwrap();

        assert!(prices.is_updated());
        assert_eq!(
            prices.snapshot.latest_end(),
            Some(local_day_start(Utc.with_ymd_and_hms(2024, 3, 16, 12, 15, 0).unwrap(), 2))
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_requests_on_fresh_cache_do_not_download() {
        let (_dir, source, clock, service) = setup(afternoon());
        service.current_prices(Region::DE).await.unwrap();
        clock.advance(Duration::seconds(20));

        let (first, second) =
            tokio::join!(service.current_prices(Region::DE), service.current_prices(Region::DE));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.snapshot, second.snapshot);
        assert!(!first.is_updated() && !second.is_updated());
    }
}
