//! Outbound notification contract.
//!
//! Delivery itself (webhook, SMS gateway, ...) lives outside the core; the
//! alert writer only asks for a best-effort dispatch.

use async_trait::async_trait;

use crate::alert::Alert;

#[derive(Debug, thiserror::Error)]
#[error("Notification via {channel} failed: {message}")]
pub struct DispatchError {
    pub channel: String,
    pub message: String,
}

impl DispatchError {
    pub fn new(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, alert: &Alert) -> Result<(), DispatchError>;

    /// Channel name used in logs (e.g. `"webhook"`).
    fn channel_name(&self) -> &str;
}
