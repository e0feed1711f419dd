//! Error types for downloading and refreshing price data

use price_model::Region;
use thiserror::Error;

/// Failure to get a response body from the upstream API
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Upstream answered with status {0}")]
    Status(u16),

    #[error("Response is no valid json: {0}")]
    Decode(String),
}

impl DownloadError {
    /// Whether trying again may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            DownloadError::Timeout | DownloadError::Connection(_) => true,
            DownloadError::Status(code) => *code == 429 || (500..600).contains(code),
            DownloadError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DownloadError::Timeout
        } else if let Some(status) = err.status() {
            DownloadError::Status(status.as_u16())
        } else if err.is_decode() {
            DownloadError::Decode(err.to_string())
        } else {
            DownloadError::Connection(err.to_string())
        }
    }
}

/// Downloaded payload does not look like upstream price data
#[derive(Error, Debug, PartialEq)]
pub enum SchemaError {
    #[error("Payload is malformed: {0}")]
    Malformed(String),

    #[error("Payload contains no price points")]
    EmptyData,

    #[error("Price point {index} has unit {unit:?}, expected \"Eur/MWh\"")]
    UnexpectedUnit { index: usize, unit: String },

    #[error("Price point {index} is invalid: {reason}")]
    InvalidPoint { index: usize, reason: String },

    #[error("Price points overlap: {0}")]
    Overlap(String),
}

/// Failure of a single fetch attempt
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Invalid price data: {0}")]
    Schema(#[from] SchemaError),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Download(err) => err.is_transient(),
            FetchError::Schema(_) => false,
        }
    }
}

/// Errors returned to callers asking for prices
#[derive(Error, Debug)]
pub enum RefreshError {
    /// Refresh failed and no cached data exists
    #[error("Refreshing {region} prices failed: {cause}")]
    RefreshFailed { region: Region, cause: String },

    /// Another refresh held the lock too long and no cached data exists
    #[error("Timed out waiting for the {region} refresh lock")]
    LockTimeout { region: Region },
}

impl RefreshError {
    pub fn refresh_failed(region: Region, cause: impl Into<String>) -> Self {
        Self::RefreshFailed { region, cause: cause.into() }
    }
}
