//! Background polling of the configured regions

use crate::config::SchedulerConfig;
use crate::service::PriceService;
use price_model::Region;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Polls the configured regions in a fixed interval so new prices are
/// picked up without waiting for a request
pub struct PriceScheduler {
    service: PriceService,
    regions: Vec<Region>,
    poll_interval: Duration,
}

impl PriceScheduler {
    /// Create a new scheduler
    pub fn new(service: PriceService, config: &SchedulerConfig) -> Self {
        Self {
            service,
            regions: config.regions.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    /// Check every region once, returning how many got new prices
    pub async fn tick(&self) -> usize {
        let mut updated = 0;

        for &region in &self.regions {
            match self.service.current_prices(region).await {
                Ok(prices) if prices.is_updated() => {
                    debug!("Scheduled check found new {} prices", region);
                    updated += 1;
                }
                Ok(prices) => {
                    debug!("No new {} prices ({:?})", region, prices.refresh);
                }
                Err(e) => {
                    error!("Scheduled {} price check failed: {}", region, e);
                }
            }
        }

        updated
    }

    /// Run until `shutdown` turns true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting price scheduler for {:?}, polling every {:?}",
            self.regions, self.poll_interval
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Price scheduler stopped");
    }
}
