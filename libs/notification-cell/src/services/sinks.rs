use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use shared_utils::Notification;

use crate::models::{DeliveryError, WebhookPayload};

/// A delivery channel. Failures are reported to the dispatcher, which logs
/// them; they never reach the operation that raised the notification.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Writes every notification to the log.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        info!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            "{}: {}",
            notification.title,
            notification.message
        );
        Ok(())
    }
}

/// Upper bound on one webhook delivery, so a hung endpoint cannot stall
/// the dispatcher.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs each notification as JSON to a configured endpoint.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self, DeliveryError> {
        Self::with_timeout(url, WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        debug!("Posting notification {} to {}", notification.id, self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload::new(notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
