//! # Price Gateway
//!
//! HTTP surface of the AWattPrice backend, built on `warp`. Serves the
//! current prices of a region, refreshing them first when they are due, and
//! answers with stale cached data rather than an error whenever any exists.

pub mod config;
pub mod error;
pub mod rest_api;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use rest_api::{create_routes, PricesResponse, DEFAULT_REGION};
