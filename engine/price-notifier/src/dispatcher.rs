//! Turns new price snapshots into delivered notifications

use crate::config::MessageConfig;
use crate::error::Result;
use crate::matcher::match_subscribers;
use crate::message::PriceBelowNotification;
use crate::sender::NotificationSender;
use crate::token_store::TokenStore;
use price_model::{Clock, PriceUpdate};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Counts of one dispatch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub matched: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Matches published snapshots against subscribers and sends notifications
pub struct NotificationDispatcher {
    store: Arc<dyn TokenStore>,
    sender: Arc<dyn NotificationSender>,
    clock: Arc<dyn Clock>,
    messages: MessageConfig,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn TokenStore>,
        sender: Arc<dyn NotificationSender>,
        clock: Arc<dyn Clock>,
        messages: MessageConfig,
    ) -> Self {
        Self { store, sender, clock, messages }
    }

    /// Notify every subscriber whose threshold tomorrow's prices reach.
    ///
    /// A failed delivery is counted and logged; the remaining subscribers
    /// are still served.
    pub async fn dispatch(&self, update: &PriceUpdate) -> Result<DispatchReport> {
        let subscribers = self.store.list_active_subscribers(update.region).await?;
        let matches =
            match_subscribers(update.region, &update.snapshot, &subscribers, self.clock.now());

        let mut report = DispatchReport { matched: matches.len(), ..Default::default() };
        debug!(
            "{} of {} {} subscribers match new prices",
            matches.len(),
            subscribers.len(),
            update.region
        );

        for m in &matches {
            let notification = PriceBelowNotification::from_match(m, &self.messages);
            match self.sender.send(&notification).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!("Failed to notify {}: {}", notification.token, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Dispatched {} price notifications: {} sent, {} failed",
            update.region, report.sent, report.failed
        );
        Ok(report)
    }

    /// Dispatch every update received until the channel closes
    pub async fn run(self, mut updates: mpsc::Receiver<PriceUpdate>) {
        info!("Starting notification dispatcher");

        while let Some(update) = updates.recv().await {
            if let Err(e) = self.dispatch(&update).await {
                error!("Dispatching {} price notifications failed: {}", update.region, e);
            }
        }

        info!("Notification dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifierError;
    use crate::token_store::InMemoryTokenStore;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use parking_lot::Mutex;
    use price_model::{Decimal, FixedClock, PricePoint, PriceSnapshot, Region, Subscriber};

    /// Records deliveries and fails for tokens listed in `failing`
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<PriceBelowNotification>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(&self, notification: &PriceBelowNotification) -> Result<()> {
            if self.failing.contains(&notification.token) {
                return Err(NotifierError::send("device unregistered"));
            }
            self.sent.lock().push(notification.clone());
            Ok(())
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap()
    }

    fn update(ct_per_kwh: &[i64]) -> PriceUpdate {
        let tomorrow = Utc.with_ymd_and_hms(2024, 3, 15, 23, 0, 0).unwrap();
        let points = ct_per_kwh
            .iter()
            .enumerate()
            .map(|(i, ct)| PricePoint::new(tomorrow + Duration::hours(i as i64), Decimal::new(ct * 10, 0)))
            .collect();
        PriceUpdate { region: Region::DE, snapshot: Arc::new(PriceSnapshot::new(points, now()).unwrap()) }
    }

    fn subscriber(id: &str, threshold: i64) -> Subscriber {
        Subscriber {
            id: id.to_string(),
            region: Region::DE,
            tax_opt_in: false,
            threshold: Decimal::new(threshold, 0),
            active: true,
        }
    }

    fn dispatcher(subscribers: Vec<Subscriber>, sender: Arc<RecordingSender>) -> NotificationDispatcher {
        NotificationDispatcher::new(
            Arc::new(InMemoryTokenStore::new(subscribers)),
            sender,
            Arc::new(FixedClock::new(now())),
            MessageConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_dispatch_notifies_matching_subscribers() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = dispatcher(vec![subscriber("cheap", 10), subscriber("picky", 2)], sender.clone());

        let report = dispatcher.dispatch(&update(&[15, 8, 20, 5, 12])).await.unwrap();

        assert_eq!(report, DispatchReport { matched: 1, sent: 1, failed: 0 });
        let sent = sender.sent.lock();
        assert_eq!(sent[0].token, "cheap");
        assert_eq!(sent[0].matching_hours, 2);
        assert_eq!(sent[0].loc_args[3], "5");
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_batch() {
        let sender = Arc::new(RecordingSender { failing: vec!["first".to_string()], ..Default::default() });
        let dispatcher = dispatcher(vec![subscriber("first", 10), subscriber("second", 10)], sender.clone());

        let report = dispatcher.dispatch(&update(&[5])).await.unwrap();

        assert_eq!(report, DispatchReport { matched: 2, sent: 1, failed: 1 });
        assert_eq!(sender.sent.lock()[0].token, "second");
    }

    #[tokio::test]
    async fn test_run_consumes_updates_until_closed() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = dispatcher(vec![subscriber("token", 10)], sender.clone());
        let (tx, rx) = mpsc::channel(4);

        let handle = tokio::spawn(dispatcher.run(rx));
        tx.send(update(&[5])).await.unwrap();
        tx.send(update(&[50])).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(sender.sent.lock().len(), 1);
    }
}
