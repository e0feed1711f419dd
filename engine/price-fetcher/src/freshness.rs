//! Decides whether cached prices are due for an upstream refresh

use crate::config::FetcherConfig;
use chrono::{DateTime, Duration, Utc};
use price_model::time::{local_day_start, local_hour};
use price_model::PriceSnapshot;

/// Outcome of a freshness check, naming the rule that decided it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessDecision {
    /// Nothing cached yet
    Missing,
    /// Next-day prices are not published before the publication hour
    BeforePublication,
    /// The upstream API was polled too recently
    CoolingDown { remaining: Duration },
    /// Cached prices already reach the day after tomorrow
    Covered,
    /// Refresh now
    Due,
}

impl FreshnessDecision {
    pub fn needs_refresh(self) -> bool {
        matches!(self, FreshnessDecision::Missing | FreshnessDecision::Due)
    }
}

/// Freshness rules for cached price data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    publication_hour: u32,
    cooldown: Duration,
}

impl FreshnessPolicy {
    pub fn new(publication_hour: u32, cooldown: Duration) -> Self {
        Self { publication_hour, cooldown }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(config.publication_hour, config.cooldown())
    }

    pub fn publication_hour(&self) -> u32 {
        self.publication_hour
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether `snapshot` should be refreshed at `now`
    pub fn needs_refresh(&self, snapshot: Option<&PriceSnapshot>, now: DateTime<Utc>) -> bool {
        self.check(snapshot, None, now).needs_refresh()
    }

    /// Evaluate the freshness rules in order.
    ///
    /// The cooldown runs from the later of the snapshot's refresh time and
    /// `last_poll`, the end of the last download attempt, successful or not.
    pub fn check(
        &self,
        snapshot: Option<&PriceSnapshot>,
        last_poll: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> FreshnessDecision {
        let Some(snapshot) = snapshot else {
            return FreshnessDecision::Missing;
        };

        if local_hour(now) < self.publication_hour {
            return FreshnessDecision::BeforePublication;
        }

        let refreshed = snapshot.last_refreshed();
        let anchor = last_poll.map_or(refreshed, |polled| polled.max(refreshed));
        let next_allowed = anchor + self.cooldown;
        if now < next_allowed {
            return FreshnessDecision::CoolingDown { remaining: next_allowed - now };
        }

        match snapshot.latest_end() {
            Some(latest_end) if latest_end >= local_day_start(now, 2) => FreshnessDecision::Covered,
            _ => FreshnessDecision::Due,
        }
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}
