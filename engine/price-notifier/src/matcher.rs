//! Decides which subscribers get a price-below notification for a snapshot

use chrono::{DateTime, Utc};
use price_model::time::local_day_start;
use price_model::units::comparison_price;
use price_model::{Decimal, PricePoint, PriceSnapshot, Region, Subscriber};

/// A subscriber whose threshold is reached tomorrow
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub subscriber: Subscriber,

    /// Qualifying points in chronological order
    pub points: Vec<PricePoint>,

    /// Cheapest qualifying point; the earliest one on ties
    pub lowest: PricePoint,

    /// Comparison price of `lowest` in ct/kWh
    pub lowest_price: Decimal,
}

/// Start and end of "tomorrow" in the provider timezone, as seen from `now`
pub fn tomorrow_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (local_day_start(now, 1), local_day_start(now, 2))
}

/// Match active subscribers of `region` against tomorrow's prices in `snapshot`
pub fn match_subscribers(
    region: Region,
    snapshot: &PriceSnapshot,
    subscribers: &[Subscriber],
    now: DateTime<Utc>,
) -> Vec<Match> {
    let (start, end) = tomorrow_window(now);
    let tomorrow: Vec<&PricePoint> = snapshot.points_between(start, end).collect();
    if tomorrow.is_empty() {
        return Vec::new();
    }

    subscribers
        .iter()
        .filter(|subscriber| subscriber.active && subscriber.region == region)
        .filter_map(|subscriber| match_one(region, subscriber, &tomorrow))
        .collect()
}

fn match_one(region: Region, subscriber: &Subscriber, points: &[&PricePoint]) -> Option<Match> {
    let mut qualifying = Vec::new();
    let mut lowest: Option<(Decimal, &PricePoint)> = None;

    for &point in points {
        let price = comparison_price(point, region, subscriber.tax_opt_in);
        if price > subscriber.threshold {
            continue;
        }

        qualifying.push(point.clone());
        if lowest.map_or(true, |(lowest_price, _)| price < lowest_price) {
            lowest = Some((price, point));
        }
    }

    lowest.map(|(lowest_price, lowest)| Match {
        subscriber: subscriber.clone(),
        points: qualifying,
        lowest: lowest.clone(),
        lowest_price,
    })
}
