use serde::Serialize;
use thiserror::Error;

use shared_utils::Notification;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook answered with status {status}")]
    Rejected { status: u16 },
}

/// Wire shape of a webhook delivery.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub event: &'static str,
    pub notification: &'a Notification,
}

impl<'a> WebhookPayload<'a> {
    pub fn new(notification: &'a Notification) -> Self {
        Self {
            event: "clinic.notification",
            notification,
        }
    }
}
