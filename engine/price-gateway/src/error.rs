//! Error types for the price gateway

use price_fetcher::RefreshError;
use serde::Serialize;
use thiserror::Error;
use warp::http::StatusCode;

/// Errors surfaced to HTTP clients
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("No price data available: {0}")]
    Unavailable(#[from] RefreshError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UnknownRegion(_) => StatusCode::NOT_FOUND,
            GatewayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::UnknownRegion(_) => "UNKNOWN_REGION",
            GatewayError::Unavailable(_) => "PRICES_UNAVAILABLE",
        }
    }

    /// Body sent along with the status
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail { code: self.code().to_string(), message: self.to_string() },
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// JSON reply carrying the matching status
    pub fn into_reply(self) -> warp::reply::WithStatus<warp::reply::Json> {
        warp::reply::with_status(warp::reply::json(&self.to_response()), self.status())
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use price_model::Region;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::UnknownRegion("CH".to_string()).status(), StatusCode::NOT_FOUND);
        let unavailable = GatewayError::from(RefreshError::LockTimeout { region: Region::AT });
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.to_response().error.code, "PRICES_UNAVAILABLE");
    }
}
