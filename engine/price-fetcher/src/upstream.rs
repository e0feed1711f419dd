//! Upstream price source and its aWATTar HTTP client

use crate::config::UpstreamConfig;
use crate::error::{DownloadError, FetchError};
use crate::models::MarketDataResponse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use price_model::{PricePoint, Region};
use reqwest::Client;
use tracing::{debug, info};

/// Source of hourly market prices
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the validated price points of `region` within `[start, end)`
    async fn fetch(
        &self,
        region: Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>, FetchError>;
}

/// HTTP client for the aWATTar market data API
#[derive(Debug, Clone)]
pub struct AwattarClient {
    config: UpstreamConfig,
    client: Client,
}

impl AwattarClient {
    /// Create a new client
    pub fn new(config: UpstreamConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("awattprice/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DownloadError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Download the raw json document for a region
    pub async fn download(
        &self,
        region: Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<serde_json::Value, DownloadError> {
        let url = self.config.url_for(region);
        info!("Polling {} price data from {}", region, url);

        let response = self
            .client
            .get(url)
            .query(&[("start", start.timestamp_millis()), ("end", end.timestamp_millis())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        debug!("Received {} bytes of {} price data", body.len(), region);

        serde_json::from_slice(&body).map_err(|e| DownloadError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PriceSource for AwattarClient {
    async fn fetch(
        &self,
        region: Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let document = self.download(region, start, end).await?;
        let points = MarketDataResponse::from_json(document)?.into_price_points()?;
        debug!("Downloaded {} valid {} price points", points.len(), region);
        Ok(points)
    }
}
