//! Error types for the price cache

use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while reading or writing cached price data
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O errors (missing permissions, full disk, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors while writing
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data is readable but not a valid snapshot
    #[error("Data corruption: {0}")]
    Corruption(String),
}

impl StorageError {
    /// Create a new corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }
}
