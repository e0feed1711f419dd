//! # Price Fetcher
//!
//! Keeps the local price cache of each region in step with the aWATTar
//! market data API.
//!
//! ## Overview
//!
//! - [`FreshnessPolicy`] decides whether cached prices are due for a refresh
//! - [`Refresher`] downloads new prices with at most one download per region
//!   in flight, retrying transient failures and falling back to cached data
//! - [`PriceService`] is what request handlers call
//! - [`PriceScheduler`] polls in the background
//!
//! Whichever caller downloads new prices, the [`Refresher`] publishes them
//! as a [`price_model::PriceUpdate`] on the channel given to
//! [`Refresher::with_updates`].
//!
//! Upstream access goes through the [`PriceSource`] trait; [`AwattarClient`]
//! is the HTTP implementation.

pub mod config;
pub mod error;
pub mod freshness;
pub mod lock;
pub mod models;
pub mod refresher;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod upstream;

pub use config::{FetcherConfig, RetryConfig, SchedulerConfig, UpstreamConfig};
pub use error::{DownloadError, FetchError, RefreshError, SchemaError};
pub use freshness::{FreshnessDecision, FreshnessPolicy};
pub use lock::{RefreshGuard, RefreshLocks, RefreshSlot};
pub use refresher::{RefreshKind, RefreshOutcome, Refresher};
pub use retry::{run_with_retry, RetryError, Retryable};
pub use scheduler::PriceScheduler;
pub use service::{CurrentPrices, PriceService};
pub use upstream::{AwattarClient, PriceSource};
