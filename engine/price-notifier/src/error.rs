//! Error types for the notifier

use thiserror::Error;

/// Result type alias for notifier operations
pub type Result<T> = std::result::Result<T, NotifierError>;

/// Errors that can occur while loading subscribers or sending notifications
#[derive(Error, Debug)]
pub enum NotifierError {
    /// Token database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored token record can't be turned into a subscriber
    #[error("Invalid token record: {0}")]
    InvalidRecord(String),

    /// Delivering a notification failed
    #[error("Sending notification failed: {0}")]
    Send(String),
}

impl NotifierError {
    /// Create a new invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a new send error
    pub fn send(msg: impl Into<String>) -> Self {
        Self::Send(msg.into())
    }
}
