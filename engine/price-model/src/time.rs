//! Provider timezone helpers and an injectable clock

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;

/// Timezone the upstream provider publishes prices in
pub const PROVIDER_TZ: Tz = chrono_tz::Europe::Berlin;

/// Hour of day of `now` in the provider timezone
pub fn local_hour(now: DateTime<Utc>) -> u32 {
    now.with_timezone(&PROVIDER_TZ).hour()
}

/// Local midnight `offset_days` after the local day containing `now`, as UTC.
///
/// `local_day_start(now, 0)` is the start of today, `1` is the start of tomorrow.
pub fn local_day_start(now: DateTime<Utc>, offset_days: i64) -> DateTime<Utc> {
    let date = now.with_timezone(&PROVIDER_TZ).date_naive() + Duration::days(offset_days);
    let midnight = date.and_time(NaiveTime::MIN);
    PROVIDER_TZ
        .from_local_datetime(&midnight)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
