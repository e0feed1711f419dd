//! Notification delivery

use crate::error::Result;
use crate::message::PriceBelowNotification;
use async_trait::async_trait;
use tracing::info;

/// Delivers notifications to devices
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &PriceBelowNotification) -> Result<()>;
}

/// Sender that only logs what it would deliver
#[derive(Debug, Clone, Default)]
pub struct LoggingSender;

#[async_trait]
impl NotificationSender for LoggingSender {
    async fn send(&self, notification: &PriceBelowNotification) -> Result<()> {
        info!(
            token = %notification.token,
            region = %notification.region,
            hours = notification.matching_hours,
            "Price below notification: {}",
            notification.payload()
        );
        Ok(())
    }
}
