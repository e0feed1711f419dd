//! Refreshes a region's cached prices with at most one download in flight
//!
//! The first caller for a region becomes the leader and downloads; callers
//! arriving while the leader works wait for it and then get the snapshot it
//! returned. Every failure path falls back to the last known snapshot, and
//! every new snapshot is published to the update channel, whoever led.

use crate::config::{FetcherConfig, RetryConfig};
use crate::error::{DownloadError, FetchError, RefreshError};
use crate::freshness::{FreshnessDecision, FreshnessPolicy};
use crate::lock::{RefreshGuard, RefreshLocks};
use crate::retry::{run_with_retry, RetryError};
use crate::upstream::PriceSource;
use chrono::{DateTime, Utc};
use price_cache::PriceCache;
use price_model::time::local_day_start;
use price_model::{Clock, PricePoint, PriceSnapshot, PriceUpdate, Region};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How a refresh produced its snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// New prices were downloaded and stored
    Updated,
    /// Nothing new upstream, or nothing was due; the cached snapshot stands
    Unchanged,
    /// Another caller refreshed; this is the snapshot it returned
    Follower,
    /// Refreshing failed; this is the last known snapshot
    Fallback,
}

/// Result of a refresh
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub snapshot: Arc<PriceSnapshot>,
    pub kind: RefreshKind,
}

impl RefreshOutcome {
    pub fn new(snapshot: PriceSnapshot, kind: RefreshKind) -> Self {
        Self::shared(Arc::new(snapshot), kind)
    }

    pub fn shared(snapshot: Arc<PriceSnapshot>, kind: RefreshKind) -> Self {
        Self { snapshot, kind }
    }

    pub fn is_updated(&self) -> bool {
        self.kind == RefreshKind::Updated
    }

    pub fn into_snapshot(self) -> Arc<PriceSnapshot> {
        self.snapshot
    }
}

/// Keeps the price cache of every region up to date
pub struct Refresher {
    source: Arc<dyn PriceSource>,
    cache: PriceCache,
    clock: Arc<dyn Clock>,
    locks: RefreshLocks,
    policy: FreshnessPolicy,
    retry: RetryConfig,
    download_timeout: Duration,
    lock_timeout: Duration,
    updates: Option<mpsc::Sender<PriceUpdate>>,
}

impl Refresher {
    /// Create a new refresher
    pub fn new(
        config: &FetcherConfig,
        source: Arc<dyn PriceSource>,
        cache: PriceCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            cache,
            clock,
            locks: RefreshLocks::new(),
            policy: FreshnessPolicy::from_config(config),
            retry: config.retry.clone(),
            download_timeout: config.upstream.timeout(),
            lock_timeout: config.lock_timeout(),
            updates: None,
        }
    }

    /// Publish every `Updated` snapshot on `updates`
    pub fn with_updates(mut self, updates: mpsc::Sender<PriceUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Cached snapshot of a region and whether it is due for a refresh
    pub async fn inspect(&self, region: Region) -> (Option<PriceSnapshot>, FreshnessDecision) {
        let cached = self.load_cached(region).await;
        let last_poll = self.load_last_poll(region).await;
        let decision = self.policy.check(cached.as_ref(), last_poll, self.clock.now());
        (cached, decision)
    }

    /// Refresh the prices of a region.
    ///
    /// Returns the best snapshot available; fails only if there is none.
    pub async fn refresh(&self, region: Region) -> Result<RefreshOutcome, RefreshError> {
        if let Some(guard) = self.locks.try_acquire(region) {
            debug!("Acquired {} refresh lock immediately, leading refresh", region);
            return self.lead(region, guard).await;
        }

        debug!("{} refresh already running, waiting up to {:?}", region, self.lock_timeout);
        match self.locks.acquire_within(region, self.lock_timeout).await {
            Some(guard) => {
                let left = (*guard).clone();
                drop(guard);
                match left {
                    Some(snapshot) => Ok(RefreshOutcome::shared(snapshot, RefreshKind::Follower)),
                    None => {
                        let cached = self.load_cached(region).await;
                        self.fall_back(region, cached, "concurrent refresh left no price data".to_string())
                    }
                }
            }
            None => match self.load_cached(region).await {
                Some(snapshot) => {
                    warn!(
                        "Timed out waiting for {} refresh, serving cached prices from {}",
                        region,
                        snapshot.last_refreshed()
                    );
                    Ok(RefreshOutcome::new(snapshot, RefreshKind::Fallback))
                }
                None => {
                    error!("Timed out waiting for {} refresh and no cached prices exist", region);
                    Err(RefreshError::LockTimeout { region })
                }
            },
        }
    }

    // Private methods

    async fn lead(
        &self,
        region: Region,
        mut guard: RefreshGuard,
    ) -> Result<RefreshOutcome, RefreshError> {
        *guard = None;
        let result = self.lead_refresh(region).await;
        *guard = result.as_ref().ok().map(|outcome| Arc::clone(&outcome.snapshot));
        drop(guard);

        if let Ok(outcome) = &result {
            if outcome.is_updated() {
                self.publish(region, Arc::clone(&outcome.snapshot)).await;
            }
        }
        result
    }

    async fn lead_refresh(&self, region: Region) -> Result<RefreshOutcome, RefreshError> {
        let (cached, decision) = self.inspect(region).await;
        if !decision.needs_refresh() {
            if let Some(snapshot) = cached {
                debug!("{} prices not due anymore ({:?}), skipping download", region, decision);
                return Ok(RefreshOutcome::new(snapshot, RefreshKind::Unchanged));
            }
        }

        let now = self.clock.now();
        let start = local_day_start(now, 0);
        let end = local_day_start(now, 2);

        let result = self.download(region, start, end).await;

        // Every finished attempt cycle starts the cooldown, failed or not
        self.record_poll(region).await;

        let points = match result {
            Ok(points) => points,
            Err(e) => return self.fall_back(region, cached, e.to_string()),
        };

        let downloaded_end = points.iter().map(|point| point.end_time).max();
        let is_new = match cached.as_ref().and_then(PriceSnapshot::latest_end) {
            Some(cached_end) => downloaded_end.is_some_and(|end| end > cached_end),
            None => true,
        };

        let cached = match cached {
            Some(snapshot) if !is_new => {
                debug!("Downloaded {} prices include no new price points", region);
                return Ok(RefreshOutcome::new(snapshot, RefreshKind::Unchanged));
            }
            other => other,
        };

        let snapshot = match PriceSnapshot::new(points, self.clock.now()) {
            Ok(snapshot) => snapshot,
            Err(e) => return self.fall_back(region, cached, e.to_string()),
        };

        // Not fatal, callers still get the new prices
        if let Err(e) = self.cache.store(region, &snapshot).await {
            error!("Failed to store new {} prices: {}", region, e);
        }

        info!(
            "Refreshed {} prices: {} points until {}",
            region,
            snapshot.len(),
            downloaded_end.map_or_else(|| "-".to_string(), |end| end.to_rfc3339())
        );
        Ok(RefreshOutcome::new(snapshot, RefreshKind::Updated))
    }

    async fn download(
        &self,
        region: Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>, RetryError<FetchError>> {
        let source = &self.source;
        let attempt_timeout = self.download_timeout;

        run_with_retry(&self.retry, |attempt| async move {
            debug!("Downloading {} prices, attempt {}", region, attempt);
            match tokio::time::timeout(attempt_timeout, source.fetch(region, start, end)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Download(DownloadError::Timeout)),
            }
        })
        .await
    }

    async fn publish(&self, region: Region, snapshot: Arc<PriceSnapshot>) {
        let Some(updates) = &self.updates else {
            return;
        };

        if updates.send(PriceUpdate { region, snapshot }).await.is_err() {
            warn!("No receiver for {} price update", region);
        } else {
            debug!("Published new {} prices", region);
        }
    }

    fn fall_back(
        &self,
        region: Region,
        cached: Option<PriceSnapshot>,
        cause: String,
    ) -> Result<RefreshOutcome, RefreshError> {
        match cached {
            Some(snapshot) => {
                warn!(
                    "Refreshing {} prices failed ({}), serving cached prices from {}",
                    region,
                    cause,
                    snapshot.last_refreshed()
                );
                Ok(RefreshOutcome::new(snapshot, RefreshKind::Fallback))
            }
            None => {
                error!("Refreshing {} prices failed and no cached prices exist: {}", region, cause);
                Err(RefreshError::refresh_failed(region, cause))
            }
        }
    }

    async fn load_cached(&self, region: Region) -> Option<PriceSnapshot> {
        match self.cache.load(region).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to read cached {} prices: {}", region, e);
                None
            }
        }
    }

    async fn load_last_poll(&self, region: Region) -> Option<DateTime<Utc>> {
        match self.cache.last_poll(region).await {
            Ok(polled) => polled,
            Err(e) => {
                warn!("Failed to read last {} poll time: {}", region, e);
                None
            }
        }
    }

    async fn record_poll(&self, region: Region) {
        if let Err(e) = self.cache.record_poll(region, self.clock.now()).await {
            warn!("Failed to record {} poll time: {}", region, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::service::PriceService;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use parking_lot::Mutex;
    use price_cache::CacheConfig;
    use price_model::{Decimal, FixedClock};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Scripted upstream; answers in order, then fails with connection errors
    struct MockSource {
        responses: Mutex<VecDeque<Result<Vec<PricePoint>, FetchError>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl MockSource {
        fn new(responses: Vec<Result<Vec<PricePoint>, FetchError>>) -> Self {
            Self { responses: Mutex::new(responses.into()), calls: AtomicUsize::new(0), delay: Duration::ZERO }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceSource for MockSource {
        async fn fetch(
            &self,
            _region: Region,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<PricePoint>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(DownloadError::Connection("no scripted response".to_string()).into()))
        }
    }

    // 14:00 in Berlin
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap()
    }

    fn hourly(hours: i64) -> Vec<PricePoint> {
        let first = local_day_start(now(), 0);
        (0..hours)
            .map(|h| PricePoint::new(first + ChronoDuration::hours(h), Decimal::new(3000 + h * 100, 2)))
            .collect()
    }

    struct Harness {
        _temp_dir: TempDir,
        cache: PriceCache,
        source: Arc<MockSource>,
        clock: Arc<FixedClock>,
        updates: mpsc::Receiver<PriceUpdate>,
        refresher: Arc<Refresher>,
    }

    fn test_config() -> FetcherConfig {
        let mut config = FetcherConfig::default();
        config.retry.initial_delay_ms = 10;
        config.retry.max_delay_ms = 20;
        config.lock_timeout_secs = 1;
        config
    }

    fn harness_with(config: FetcherConfig, source: MockSource) -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let cache = PriceCache::new(CacheConfig::new(temp_dir.path())).unwrap();
        let source = Arc::new(source);
        let clock = Arc::new(FixedClock::new(now()));
        let (tx, updates) = mpsc::channel(8);
        let refresher = Refresher::new(&config, source.clone(), cache.clone(), clock.clone()).with_updates(tx);
        Harness { _temp_dir: temp_dir, cache, source, clock, updates, refresher: Arc::new(refresher) }
    }

    fn harness(source: MockSource) -> Harness {
        harness_with(test_config(), source)
    }

    async fn seed(cache: &PriceCache, hours: i64, refreshed: DateTime<Utc>) -> PriceSnapshot {
        let snapshot = PriceSnapshot::new(hourly(hours), refreshed).unwrap();
        cache.store(Region::DE, &snapshot).await.unwrap();
        snapshot
    }

    #[tokio::test]
    async fn test_refresh_without_cache_downloads_and_stores() {
        let h = harness(MockSource::new(vec![Ok(hourly(48))]));

        let outcome = h.refresher.refresh(Region::DE).await.unwrap();

        assert_eq!(outcome.kind, RefreshKind::Updated);
        assert_eq!(outcome.snapshot.len(), 48);
        assert_eq!(outcome.snapshot.last_refreshed(), now());
        assert_eq!(h.cache.load(Region::DE).await.unwrap().as_ref(), Some(outcome.snapshot.as_ref()));
        assert_eq!(h.cache.last_poll(Region::DE).await.unwrap(), Some(now()));
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refreshes_download_once() {
        let source = MockSource::new(vec![Ok(hourly(48))]).with_delay(Duration::from_millis(200));
        let h = harness(source);

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let refresher = Arc::clone(&h.refresher);
                tokio::spawn(async move { refresher.refresh(Region::DE).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(h.source.calls(), 1);
        assert_eq!(outcomes.iter().filter(|o| o.kind == RefreshKind::Updated).count(), 1);
        assert!(outcomes.iter().all(|o| o.snapshot.last_refreshed() == now()));
        assert!(outcomes.iter().all(|o| o.snapshot.len() == 48));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_with_fresh_cache_skip_download() {
        let h = harness(MockSource::new(vec![Ok(hourly(48))]));
        let cached = seed(&h.cache, 48, now() - ChronoDuration::seconds(30)).await;

        let first = tokio::spawn({
            let refresher = Arc::clone(&h.refresher);
            async move { refresher.refresh(Region::DE).await }
        });
        let second = tokio::spawn({
            let refresher = Arc::clone(&h.refresher);
            async move { refresher.refresh(Region::DE).await }
        });

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(h.source.calls(), 0);
        assert_eq!(first.snapshot.as_ref(), &cached);
        assert_eq!(second.snapshot.as_ref(), &cached);
        assert!(!first.is_updated() && !second.is_updated());
    }

    #[tokio::test]
    async fn test_download_without_new_prices_is_noop() {
        let h = harness(MockSource::new(vec![Ok(hourly(24))]));
        let refreshed = now() - ChronoDuration::hours(2);
        let cached = seed(&h.cache, 24, refreshed).await;

        let outcome = h.refresher.refresh(Region::DE).await.unwrap();

        assert_eq!(outcome.kind, RefreshKind::Unchanged);
        assert_eq!(outcome.snapshot.as_ref(), &cached);
        assert_eq!(h.source.calls(), 1);
        assert_eq!(h.cache.load(Region::DE).await.unwrap().unwrap().last_refreshed(), refreshed);
        // the poll still counts for the cooldown
        assert_eq!(h.cache.last_poll(Region::DE).await.unwrap(), Some(now()));
    }

    #[tokio::test]
    async fn test_newer_prices_replace_cache() {
        let h = harness(MockSource::new(vec![Ok(hourly(48))]));
        seed(&h.cache, 24, now() - ChronoDuration::hours(2)).await;

        let outcome = h.refresher.refresh(Region::DE).await.unwrap();

        assert_eq!(outcome.kind, RefreshKind::Updated);
        let stored = h.cache.load(Region::DE).await.unwrap().unwrap();
        assert_eq!(stored.len(), 48);
        assert_eq!(stored.last_refreshed(), now());
    }

    #[tokio::test]
    async fn test_schema_error_falls_back_without_retry() {
        let h = harness(MockSource::new(vec![Err(SchemaError::EmptyData.into()), Ok(hourly(48))]));
        let cached = seed(&h.cache, 24, now() - ChronoDuration::hours(2)).await;

        let outcome = h.refresher.refresh(Region::DE).await.unwrap();

        assert_eq!(outcome.kind, RefreshKind::Fallback);
        assert_eq!(outcome.snapshot.as_ref(), &cached);
        assert_eq!(h.source.calls(), 1);
        assert_eq!(h.cache.load(Region::DE).await.unwrap(), Some(cached));
        assert_eq!(h.cache.last_poll(Region::DE).await.unwrap(), Some(now()));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let h = harness(MockSource::new(vec![
            Err(DownloadError::Status(503).into()),
            Err(DownloadError::Timeout.into()),
            Ok(hourly(48)),
        ]));

        let outcome = h.refresher.refresh(Region::DE).await.unwrap();

        assert_eq!(outcome.kind, RefreshKind::Updated);
        assert_eq!(h.source.calls(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_falls_back_and_starts_cooldown() {
        let h = harness(MockSource::new(Vec::new()));
        let cached = seed(&h.cache, 24, now() - ChronoDuration::hours(2)).await;

        let outcome = h.refresher.refresh(Region::DE).await.unwrap();

        assert_eq!(outcome.kind, RefreshKind::Fallback);
        assert_eq!(outcome.snapshot.as_ref(), &cached);
        assert_eq!(h.source.calls(), 4);
        assert_eq!(h.cache.last_poll(Region::DE).await.unwrap(), Some(now()));
    }

    #[tokio::test]
    async fn test_failing_upstream_is_polled_once_per_cooldown() {
        let failures: Vec<Result<Vec<PricePoint>, FetchError>> =
            (0..8).map(|_| Err(DownloadError::Status(503).into())).collect();
        let h = harness(MockSource::new(failures));
        seed(&h.cache, 24, now() - ChronoDuration::hours(2)).await;
        let service = PriceService::new(Arc::clone(&h.refresher));

        for _ in 0..5 {
            let prices = service.current_prices(Region::DE).await.unwrap();
            assert_eq!(prices.snapshot.len(), 24);
            h.clock.advance(ChronoDuration::seconds(5));
        }
        // one attempt cycle, the other requests hit the cooldown
        assert_eq!(h.source.calls(), 4);

        h.clock.advance(ChronoDuration::seconds(60));
        let prices = service.current_prices(Region::DE).await.unwrap();
        assert_eq!(prices.refresh, Some(RefreshKind::Fallback));
        assert_eq!(h.source.calls(), 8);
    }

    #[tokio::test]
    async fn test_failure_without_cache_is_an_error() {
        let h = harness(MockSource::new(vec![Err(DownloadError::Status(404).into())]));

        let err = h.refresher.refresh(Region::DE).await.unwrap_err();

        assert!(matches!(err, RefreshError::RefreshFailed { region: Region::DE, .. }));
        assert_eq!(h.source.calls(), 1);
        assert_eq!(h.cache.load(Region::DE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_slow_attempt_is_cut_off() {
        let mut config = test_config();
        config.upstream.timeout_secs = 1;
        config.retry.max_attempts = 1;
        let h = harness_with(config, MockSource::new(vec![Ok(hourly(48))]).with_delay(Duration::from_secs(3)));

        let err = h.refresher.refresh(Region::DE).await.unwrap_err();

        match err {
            RefreshError::RefreshFailed { cause, .. } => assert!(cause.contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_lock_timeout_serves_cached_prices() {
        let h = harness(MockSource::new(vec![Ok(hourly(48))]));
        let cached = seed(&h.cache, 24, now() - ChronoDuration::hours(2)).await;
        let _held = h.refresher.locks.try_acquire(Region::DE).unwrap();

        let outcome = h.refresher.refresh(Region::DE).await.unwrap();

        assert_eq!(outcome.kind, RefreshKind::Fallback);
        assert_eq!(outcome.snapshot.as_ref(), &cached);
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_lock_timeout_without_cache_is_an_error() {
        let h = harness(MockSource::new(vec![Ok(hourly(48))]));
        let _held = h.refresher.locks.try_acquire(Region::DE).unwrap();

        let err = h.refresher.refresh(Region::DE).await.unwrap_err();
        assert!(matches!(err, RefreshError::LockTimeout { region: Region::DE }));
    }

    #[tokio::test]
    async fn test_regions_refresh_independently() {
        let h = harness(MockSource::new(vec![Ok(hourly(48))]));
        let _held = h.refresher.locks.try_acquire(Region::DE).unwrap();

        let outcome = h.refresher.refresh(Region::AT).await.unwrap();
        assert_eq!(outcome.kind, RefreshKind::Updated);
        assert!(h.cache.load(Region::AT).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_leader_skips_download_when_not_due() {
        let h = harness(MockSource::new(vec![Ok(hourly(48))]));
        let cached = seed(&h.cache, 24, now() - ChronoDuration::hours(2)).await;
        h.cache.record_poll(Region::DE, now() - ChronoDuration::seconds(5)).await.unwrap();

        let outcome = h.refresher.refresh(Region::DE).await.unwrap();

        assert_eq!(outcome.kind, RefreshKind::Unchanged);
        assert_eq!(outcome.snapshot.as_ref(), &cached);
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_followers_get_leader_snapshot_when_store_fails() {
        let source = MockSource::new(vec![Ok(hourly(48))]).with_delay(Duration::from_millis(200));
        let h = harness(source);
        // a directory in place of the snapshot file: reading and replacing it fail
        std::fs::create_dir_all(h.cache.config().snapshot_file(Region::DE)).unwrap();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let refresher = Arc::clone(&h.refresher);
                tokio::spawn(async move { refresher.refresh(Region::DE).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(h.source.calls(), 1);
        assert!(h.cache.load(Region::DE).await.is_err());
        assert_eq!(outcomes.iter().filter(|o| o.kind == RefreshKind::Updated).count(), 1);
        let leader = outcomes.iter().find(|o| o.is_updated()).unwrap();
        assert!(outcomes.iter().all(|o| Arc::ptr_eq(&o.snapshot, &leader.snapshot)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_follower_treats_unreadable_cache_as_missing() {
        let source = MockSource::new(vec![Err(DownloadError::Status(404).into())])
            .with_delay(Duration::from_millis(200));
        let h = harness(source);
        std::fs::create_dir_all(h.cache.config().snapshot_file(Region::DE)).unwrap();

        let leader = tokio::spawn({
            let refresher = Arc::clone(&h.refresher);
            async move { refresher.refresh(Region::DE).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let follower = h.refresher.refresh(Region::DE).await;

        assert!(matches!(follower, Err(RefreshError::RefreshFailed { region: Region::DE, .. })));
        assert!(matches!(leader.await.unwrap(), Err(RefreshError::RefreshFailed { .. })));
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_new_prices_are_published_once() {
        let source = MockSource::new(vec![Ok(hourly(48))]).with_delay(Duration::from_millis(200));
        let mut h = harness(source);

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let refresher = Arc::clone(&h.refresher);
                tokio::spawn(async move { refresher.refresh(Region::DE).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let update = h.updates.try_recv().unwrap();
        assert_eq!(update.region, Region::DE);
        assert_eq!(update.snapshot.len(), 48);
        assert!(h.updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unchanged_and_fallback_are_not_published() {
        let mut h = harness(MockSource::new(vec![Ok(hourly(24))]));
        seed(&h.cache, 24, now() - ChronoDuration::hours(2)).await;

        assert_eq!(h.refresher.refresh(Region::DE).await.unwrap().kind, RefreshKind::Unchanged);
        h.clock.advance(ChronoDuration::seconds(61));
        assert_eq!(h.refresher.refresh(Region::DE).await.unwrap().kind, RefreshKind::Fallback);

        assert!(h.updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refresh_without_receiver_still_succeeds() {
        let mut h = harness(MockSource::new(vec![Ok(hourly(48))]));
        h.updates.close();

        let outcome = h.refresher.refresh(Region::DE).await.unwrap();

        assert_eq!(outcome.kind, RefreshKind::Updated);
    }
}
