//! Region, price point, snapshot and subscriber types

use crate::error::ModelError;
use crate::units;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Market region served by the upstream provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(alias = "de")]
    DE,
    #[serde(alias = "at")]
    AT,
}

impl Region {
    /// All supported regions
    pub const ALL: [Region; 2] = [Region::DE, Region::AT];

    /// Multiplier to get the tax-inclusive price
    pub fn tax_multiplier(self) -> Decimal {
        match self {
            Region::DE => Decimal::new(119, 2),
            Region::AT => Decimal::new(120, 2),
        }
    }

    /// Upper-case identifier as used on the wire ("DE", "AT")
    pub fn as_str(self) -> &'static str {
        match self {
            Region::DE => "DE",
            Region::AT => "AT",
        }
    }

    /// Lower-case identifier as used in file names
    pub fn as_lower(self) -> &'static str {
        match self {
            Region::DE => "de",
            Region::AT => "at",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DE" => Ok(Region::DE),
            "AT" => Ok(Region::AT),
            _ => Err(ModelError::UnknownRegion(s.to_string())),
        }
    }
}

/// One hourly price
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PricePoint {
    /// Start of the hour (inclusive)
    pub start_time: DateTime<Utc>,

    /// End of the hour (exclusive), always `start_time + 1h`
    pub end_time: DateTime<Utc>,

    /// Market price in Eur/MWh
    pub market_price: Decimal,
}

impl PricePoint {
    /// Create a one-hour price point starting at `start_time`
    pub fn new(start_time: DateTime<Utc>, market_price: Decimal) -> Self {
        Self { start_time, end_time: start_time + Duration::hours(1), market_price }
    }

    /// Create a price point from explicit bounds, rejecting anything but one hour
    pub fn from_bounds(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        market_price: Decimal,
    ) -> Result<Self, ModelError> {
        if end_time - start_time != Duration::hours(1) {
            return Err(ModelError::InvalidPointDuration { start: start_time, end: end_time });
        }
        Ok(Self { start_time, end_time, market_price })
    }

    /// Create a price point from unix-second bounds
    pub fn from_unix_seconds(
        start: i64,
        end: i64,
        market_price: Decimal,
    ) -> Result<Self, ModelError> {
        let start_time =
            DateTime::<Utc>::from_timestamp(start, 0).ok_or(ModelError::InvalidTimestamp(start))?;
        let end_time =
            DateTime::<Utc>::from_timestamp(end, 0).ok_or(ModelError::InvalidTimestamp(end))?;
        Self::from_bounds(start_time, end_time, market_price)
    }

    /// Market price converted to ct/kWh (unrounded)
    pub fn ct_per_kwh(&self) -> Decimal {
        units::eur_mwh_to_ct_kwh(self.market_price)
    }
}

/// Immutable, timestamped set of price points for one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSnapshot {
    points: Vec<PricePoint>,
    last_refreshed: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Build a snapshot, ordering the points by start time.
    ///
    /// Fails if two points overlap.
    pub fn new(
        mut points: Vec<PricePoint>,
        last_refreshed: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        points.sort_by_key(|point| point.start_time);
        for pair in points.windows(2) {
            if pair[1].start_time < pair[0].end_time {
                return Err(ModelError::OverlappingPoints { start: pair[1].start_time });
            }
        }
        Ok(Self { points, last_refreshed })
    }

    /// Points ordered by start time
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// When this snapshot was produced from an upstream download
    pub fn last_refreshed(&self) -> DateTime<Utc> {
        self.last_refreshed
    }

    /// End time of the latest point
    pub fn latest_end(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|point| point.end_time)
    }

    /// Points whose start time lies in `[start, end)`
    pub fn points_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &PricePoint> {
        self.points.iter().filter(move |point| point.start_time >= start && point.start_time < end)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A freshly downloaded snapshot, published to whoever reacts to new prices
#[derive(Debug, Clone)]
pub struct PriceUpdate {
    pub region: Region,
    pub snapshot: Arc<PriceSnapshot>,
}

/// A token registered for "price below" notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Device token identifying the subscriber
    pub id: String,

    /// Region whose prices the subscriber follows
    pub region: Region,

    /// Compare against tax-inclusive prices
    pub tax_opt_in: bool,

    /// Notify when a price is at or below this value (ct/kWh)
    pub threshold: Decimal,

    /// Whether the notification is switched on
    pub active: bool,
}
