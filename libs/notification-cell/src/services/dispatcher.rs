use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_utils::Notification;

use crate::services::sinks::{LogSink, NotificationSink, WebhookSink};

const FEED_CAPACITY: usize = 256;

/// Drains the notification queue into every sink and mirrors each
/// notification onto a broadcast feed.
pub struct NotificationDispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
    feed: broadcast::Sender<Notification>,
}

impl NotificationDispatcher {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self { sinks, feed }
    }

    /// Log delivery always; webhook delivery when a URL is configured.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(LogSink)];
        if let Some(url) = &config.notification_webhook_url {
            match WebhookSink::new(url.clone()) {
                Ok(sink) => {
                    info!("Delivering notifications to webhook {}", url);
                    sinks.push(Arc::new(sink));
                }
                Err(e) => warn!("Webhook delivery disabled, client setup failed: {}", e),
            }
        }
        Self::new(sinks)
    }

    /// Receivers only see notifications dispatched after they subscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.feed.subscribe()
    }

    pub async fn dispatch(&self, notification: &Notification) {
        let deliveries = self.sinks.iter().map(|sink| async move {
            if let Err(e) = sink.deliver(notification).await {
                warn!(
                    "{} sink failed to deliver notification {}: {}",
                    sink.name(),
                    notification.id,
                    e
                );
            }
        });
        join_all(deliveries).await;

        // No subscribers is the normal case.
        let _ = self.feed.send(notification.clone());
    }

    /// Runs until every `Notifier` clone has been dropped.
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<Notification>) {
        while let Some(notification) = receiver.recv().await {
            debug!(
                "Dispatching {:?} notification {}",
                notification.kind, notification.id
            );
            self.dispatch(&notification).await;
        }
        info!("Notification queue closed, dispatcher stopping");
    }

    pub fn spawn(self, receiver: mpsc::UnboundedReceiver<Notification>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use shared_utils::{NotificationKind, Notifier};
    use uuid::Uuid;

    use crate::models::DeliveryError;
    use crate::services::sinks::MockNotificationSink;

    fn sample(kind: NotificationKind) -> Notification {
        Notification::new(
            Uuid::new_v4(),
            kind,
            "Checked in",
            "Your position in queue: 1",
            json!({ "position": 1 }),
            Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap().fixed_offset(),
        )
    }

    #[tokio::test]
    async fn every_sink_sees_every_notification() {
        let mut first = MockNotificationSink::new();
        first.expect_deliver().times(2).returning(|_| Ok(()));
        let mut second = MockNotificationSink::new();
        second.expect_deliver().times(2).returning(|_| Ok(()));

        let dispatcher = NotificationDispatcher::new(vec![Arc::new(first), Arc::new(second)]);
        let (notifier, receiver) = Notifier::channel();
        let handle = dispatcher.spawn(receiver);

        notifier.notify(sample(NotificationKind::CheckedIn));
        notifier.notify(sample(NotificationKind::PatientCalled));
        drop(notifier);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn failing_sink_does_not_stop_the_others() {
        let mut broken = MockNotificationSink::new();
        broken.expect_name().return_const("broken");
        broken
            .expect_deliver()
            .times(1)
            .returning(|_| Err(DeliveryError::Rejected { status: 503 }));
        let mut healthy = MockNotificationSink::new();
        healthy.expect_deliver().times(1).returning(|_| Ok(()));

        let dispatcher = NotificationDispatcher::new(vec![Arc::new(broken), Arc::new(healthy)]);
        let mut feed = dispatcher.subscribe();

        let sent = sample(NotificationKind::BookingConfirmation);
        dispatcher.dispatch(&sent).await;

        assert_eq!(feed.recv().await.unwrap(), sent);
    }

    #[test]
    fn webhook_sink_is_added_only_when_configured() {
        let mut config = shared_utils::test_utils::TestConfig::default().to_app_config();
        assert_eq!(NotificationDispatcher::from_config(&config).sinks.len(), 1);

        config.notification_webhook_url = Some("http://localhost:9/hook".to_string());
        let dispatcher = NotificationDispatcher::from_config(&config);
        let names: Vec<_> = dispatcher.sinks.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["log", "webhook"]);
    }
}
