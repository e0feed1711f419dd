//! Error types for the price model

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised while building model values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Price point starting at {start} does not span exactly one hour (ends at {end})")]
    InvalidPointDuration { start: DateTime<Utc>, end: DateTime<Utc> },

    #[error("Price point starting at {start} overlaps the previous point")]
    OverlappingPoints { start: DateTime<Utc> },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}
