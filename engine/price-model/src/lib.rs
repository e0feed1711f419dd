//! # Price Model
//!
//! Shared data types for the AWattPrice backend: regions, hourly price points,
//! price snapshots and notification subscribers, together with the unit
//! conversions and provider-timezone helpers every other crate relies on.
//!
//! Market prices are kept in the upstream unit (Eur/MWh) and only converted to
//! ct/kWh where a user-facing comparison is made.

pub mod error;
pub mod time;
pub mod types;
pub mod units;

pub use error::ModelError;
pub use time::{Clock, FixedClock, SystemClock, PROVIDER_TZ};
pub use types::{PricePoint, PriceSnapshot, PriceUpdate, Region, Subscriber};

/// Re-export common types for convenience
pub use chrono::{DateTime, Utc};
pub use rust_decimal::Decimal;
