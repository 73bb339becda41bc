use std::sync::Arc;

use herdwatch_core::alert::Alert;
use herdwatch_events::bus::event_types;
use herdwatch_events::PlatformEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::realtime::SubscriptionHub;
use crate::ws::ServerMessage;

/// Forwards alert events to the subject's current observers: `alert.created`
/// as `alert-notification`, `alert.acknowledged` as `alert-acknowledged`.
pub struct AlertRelay {
    hub: Arc<SubscriptionHub>,
}

impl AlertRelay {
    pub fn new(hub: Arc<SubscriptionHub>) -> Self {
        Self { hub }
    }

    /// Run until `cancel` fires or the event bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Alert relay stopping");
                    break;
                }
                received = receiver.recv() => received,
            };

            match received {
                Ok(event) => self.relay(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Alert relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, alert relay shutting down");
                    break;
                }
            }
        }
    }

    async fn relay(&self, event: &PlatformEvent) {
        let frame: fn(Alert) -> ServerMessage = match event.event_type.as_str() {
            event_types::ALERT_CREATED => ServerMessage::alert_notification,
            event_types::ALERT_ACKNOWLEDGED => ServerMessage::alert_acknowledged,
            _ => return,
        };
        let alert: Alert = match event.payload_as() {
            Ok(alert) => alert,
            Err(e) => {
                tracing::error!(error = %e, event_type = %event.event_type, "Undecodable alert payload");
                return;
            }
        };

        let subject_id = alert.subject_id;
        let alert_id = alert.alert_id;
        let report = self.hub.publish(subject_id, &frame(alert)).await;
        tracing::debug!(
            subject_id,
            alert_id,
            event_type = %event.event_type,
            delivered = report.delivered,
            failed = report.failed,
            "Alert event relayed to observers"
        );
    }
}
