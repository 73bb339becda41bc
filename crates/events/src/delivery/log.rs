//! Fallback dispatcher that only writes the alert to the log.

use async_trait::async_trait;
use herdwatch_core::alert::Alert;
use herdwatch_core::notify::{DispatchError, NotificationDispatcher};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, alert: &Alert) -> Result<(), DispatchError> {
        tracing::warn!(
            alert_id = alert.alert_id,
            subject_id = alert.subject_id,
            owner_id = alert.owner_id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            value = alert.value,
            "Alert notification (no webhook configured)"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
