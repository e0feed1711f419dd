//! Upstream market data payload and its conversion into price points

use crate::error::SchemaError;
use chrono::{DateTime, Utc};
use price_model::PricePoint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Unit the upstream API quotes prices in
pub const MARKET_PRICE_UNIT: &str = "Eur/MWh";

/// Market data response of the aWATTar API
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketDataResponse {
    pub data: Vec<MarketDataPoint>,
}

/// One entry of the market data response
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketDataPoint {
    /// Start of the hour in unix milliseconds
    pub start_timestamp: i64,

    /// End of the hour in unix milliseconds
    pub end_timestamp: i64,

    pub marketprice: serde_json::Number,

    pub unit: String,
}

impl MarketDataResponse {
    /// Parse a decoded response body, checking its structure
    pub fn from_json(value: serde_json::Value) -> Result<Self, SchemaError> {
        serde_json::from_value(value).map_err(|e| SchemaError::Malformed(e.to_string()))
    }

    /// Validate the response and convert it into ordered price points
    pub fn into_price_points(self) -> Result<Vec<PricePoint>, SchemaError> {
        if self.data.is_empty() {
            return Err(SchemaError::EmptyData);
        }

        let mut points = self
            .data
            .into_iter()
            .enumerate()
            .map(|(index, point)| point.into_price_point(index))
            .collect::<Result<Vec<_>, _>>()?;

        points.sort_by_key(|point| point.start_time);
        for pair in points.windows(2) {
            if pair[1].start_time < pair[0].end_time {
                return Err(SchemaError::Overlap(format!(
                    "{} starts before {} ends",
                    pair[1].start_time, pair[0].end_time
                )));
            }
        }

        Ok(points)
    }
}

impl MarketDataPoint {
    fn into_price_point(self, index: usize) -> Result<PricePoint, SchemaError> {
        if self.unit != MARKET_PRICE_UNIT {
            return Err(SchemaError::UnexpectedUnit { index, unit: self.unit });
        }

        let invalid = |reason: String| SchemaError::InvalidPoint { index, reason };

        let start = millis_to_datetime(self.start_timestamp)
            .ok_or_else(|| invalid(format!("invalid start_timestamp {}", self.start_timestamp)))?;
        let end = millis_to_datetime(self.end_timestamp)
            .ok_or_else(|| invalid(format!("invalid end_timestamp {}", self.end_timestamp)))?;
        let price = parse_decimal(&self.marketprice)
            .ok_or_else(|| invalid(format!("invalid marketprice {}", self.marketprice)))?;

        PricePoint::from_bounds(start, end, price).map_err(|e| invalid(e.to_string()))
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

fn parse_decimal(number: &serde_json::Number) -> Option<Decimal> {
    let raw = number.to_string();
    Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)).ok()
}
