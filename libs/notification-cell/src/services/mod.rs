pub mod dispatcher;
pub mod sinks;

pub use dispatcher::NotificationDispatcher;
pub use sinks::{LogSink, NotificationSink, WebhookSink, WEBHOOK_TIMEOUT};
