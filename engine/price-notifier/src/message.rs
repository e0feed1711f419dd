//! Price-below notification content

use crate::config::MessageConfig;
use crate::matcher::Match;
use chrono::{DateTime, Duration, Utc};
use price_model::{Decimal, Region, PROVIDER_TZ};
use serde::Serialize;
use serde_json::json;

/// Notification telling a subscriber that tomorrow's prices drop below their threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBelowNotification {
    /// Device token of the recipient
    pub token: String,
    pub region: Region,

    /// Threshold of the subscriber in ct/kWh
    pub below_value: Decimal,

    /// Number of hours at or below the threshold
    pub matching_hours: usize,

    pub lowest_start: DateTime<Utc>,
    pub lowest_end: DateTime<Utc>,

    /// Lowest comparison price in ct/kWh
    pub lowest_price: Decimal,

    pub title_loc_key: String,
    pub loc_key: String,

    /// Date, start hour, end hour and price of the lowest point, formatted for display
    pub loc_args: Vec<String>,

    pub collapse_id: String,

    /// The notification is pointless once the cheapest hour is about to start
    pub expires_at: DateTime<Utc>,
}

impl PriceBelowNotification {
    /// Build the notification for a match
    pub fn from_match(m: &Match, messages: &MessageConfig) -> Self {
        let start = m.lowest.start_time.with_timezone(&PROVIDER_TZ);
        let end = m.lowest.end_time.with_timezone(&PROVIDER_TZ);

        let loc_key = if m.points.len() == 1 {
            messages.body_loc_key_single.clone()
        } else {
            messages.body_loc_key_multiple.clone()
        };

        Self {
            token: m.subscriber.id.clone(),
            region: m.subscriber.region,
            below_value: m.subscriber.threshold,
            matching_hours: m.points.len(),
            lowest_start: m.lowest.start_time,
            lowest_end: m.lowest.end_time,
            lowest_price: m.lowest_price,
            title_loc_key: messages.title_loc_key.clone(),
            loc_key,
            loc_args: vec![
                start.format("%d.%m.%Y").to_string(),
                start.format("%-H").to_string(),
                end.format("%-H").to_string(),
                format_price(m.lowest_price),
            ],
            collapse_id: messages.collapse_id.clone(),
            expires_at: m.lowest.start_time - Duration::hours(1),
        }
    }

    /// Push payload as understood by the app
    pub fn payload(&self) -> serde_json::Value {
        json!({
            "aps": {
                "alert": {
                    "title-loc-key": self.title_loc_key,
                    "loc-key": self.loc_key,
                    "loc-args": self.loc_args,
                },
                "badge": 0,
                "sound": "default",
                "content-available": 0,
            }
        })
    }
}

/// Format a ct/kWh price with a decimal comma: whole values without decimals, others with two
pub fn format_price(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let formatted = if rounded.fract().is_zero() {
        format!("{}", rounded.trunc())
    } else {
        format!("{:.2}", rounded)
    };
    formatted.replace('.', ",")
}
