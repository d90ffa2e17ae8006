use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    BookingConfirmation,
    NewAppointment,
    AppointmentModified,
    AppointmentCancelled,
    CheckedIn,
    DoctorCheckedIn,
    QueuePositionChanged,
    PatientCalled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub context: Value,
    pub created_at: DateTime<FixedOffset>,
}

impl Notification {
    pub fn new(
        recipient: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        context: Value,
        created_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            kind,
            title: title.into(),
            message: message.into(),
            context,
            created_at,
        }
    }
}

/// Outbound side of the notification queue. Publishing never blocks and
/// never fails the caller.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn notify(&self, notification: Notification) {
        debug!(
            "Queueing {:?} notification for {}",
            notification.kind, notification.recipient
        );
        if let Err(e) = self.sender.send(notification) {
            warn!(
                "Notification dispatcher is gone, dropping {:?} for {}",
                e.0.kind, e.0.recipient
            );
        }
    }

    pub fn notify_all(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            self.notify(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample() -> Notification {
        Notification::new(
            Uuid::new_v4(),
            NotificationKind::CheckedIn,
            "Checked in",
            "Your position in queue: 1",
            json!({ "position": 1 }),
            Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap().fixed_offset(),
        )
    }

    #[tokio::test]
    async fn published_notifications_reach_the_receiver() {
        let (notifier, mut receiver) = Notifier::channel();
        let sent = sample();
        notifier.notify(sent.clone());
        assert_eq!(receiver.recv().await, Some(sent));
    }

    #[tokio::test]
    async fn closed_receiver_does_not_fail_the_publisher() {
        let (notifier, receiver) = Notifier::channel();
        drop(receiver);
        notifier.notify(sample());
    }
}
