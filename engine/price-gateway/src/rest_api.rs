//! REST API endpoints for price data
//!
//! - `GET /data/{region}` current prices of a region
//! - `GET /data/` redirects to the default region
//! - `GET /health` liveness check

use crate::error::GatewayError;
use price_fetcher::PriceService;
use price_model::{Decimal, PricePoint, PriceSnapshot, Region};
use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, warn};
use warp::http::Uri;
use warp::{Filter, Reply};

/// Region served by `/data/`
pub const DEFAULT_REGION: Region = Region::DE;

/// Price data response
#[derive(Debug, Serialize)]
pub struct PricesResponse {
    pub prices: Vec<PricePointResponse>,
}

/// One hour of prices; timestamps in unix seconds, price in Eur/MWh
#[derive(Debug, Serialize)]
pub struct PricePointResponse {
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub marketprice: Decimal,
}

impl From<&PricePoint> for PricePointResponse {
    fn from(point: &PricePoint) -> Self {
        Self {
            start_timestamp: point.start_time.timestamp(),
            end_timestamp: point.end_time.timestamp(),
            marketprice: point.market_price,
        }
    }
}

impl From<&PriceSnapshot> for PricesResponse {
    fn from(snapshot: &PriceSnapshot) -> Self {
        Self { prices: snapshot.points().iter().map(PricePointResponse::from).collect() }
    }
}

/// Get current prices of a region
pub async fn get_region_prices(
    region: String,
    service: PriceService,
) -> Result<warp::reply::Response, warp::Rejection> {
    let region = match Region::from_str(&region) {
        Ok(region) => region,
        Err(_) => {
            debug!("Request for unknown region {:?}", region);
            return Ok(GatewayError::UnknownRegion(region).into_reply().into_response());
        }
    };

    match service.current_prices(region).await {
        Ok(prices) => {
            let response = PricesResponse::from(prices.snapshot.as_ref());
            Ok(warp::reply::json(&response).into_response())
        }
        Err(e) => {
            warn!("No {} prices to serve: {}", region, e);
            Ok(GatewayError::from(e).into_reply().into_response())
        }
    }
}

/// Create REST API routes
pub fn create_routes(
    service: PriceService,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let service_filter = warp::any().map(move || service.clone());

    // Region prices endpoint
    let region_prices = warp::path("data")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(service_filter)
        .and_then(get_region_prices);

    // Default region redirect
    let default_region = warp::path("data").and(warp::path::end()).and(warp::get()).map(|| {
        let location = format!("/data/{}", DEFAULT_REGION);
        match location.parse::<Uri>() {
            Ok(uri) => warp::redirect::temporary(uri).into_response(),
            Err(_) => warp::http::StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    });

    // Health check endpoint
    let health = warp::path("health").and(warp::path::end()).and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    });

    default_region
        .or(region_prices)
        .or(health)
        .with(warp::cors().allow_any_origin().allow_methods(vec!["GET"]))
}
