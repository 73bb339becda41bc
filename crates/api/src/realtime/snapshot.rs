use std::sync::Arc;

use herdwatch_core::clock::Clock;
use herdwatch_core::store::{AlertStore, ReadingStore, StoreError, Subject};

use crate::ws::ServerMessage;

/// How far back the display path looks for unacknowledged alerts.
pub const ALERT_LOOKBACK_MINUTES: i64 = 10;

/// Builds the display snapshot for one subject.
pub struct SnapshotSource {
    readings: Arc<dyn ReadingStore>,
    alerts: Arc<dyn AlertStore>,
    clock: Arc<dyn Clock>,
}

impl SnapshotSource {
    pub fn new(
        readings: Arc<dyn ReadingStore>,
        alerts: Arc<dyn AlertStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            readings,
            alerts,
            clock,
        }
    }

    /// Latest reading (if any) followed by every unacknowledged alert of the
    /// last [`ALERT_LOOKBACK_MINUTES`], newest first.
    pub async fn fetch(&self, subject: &Subject) -> Result<Vec<ServerMessage>, StoreError> {
        let since = self.clock.now() - chrono::Duration::minutes(ALERT_LOOKBACK_MINUTES);

        let mut messages = Vec::new();
        if let Some(reading) = self.readings.latest(&subject.tag_id).await? {
            messages.push(ServerMessage::ReadingUpdate {
                subject_id: subject.id,
                reading,
            });
        }
        let alerts = self.alerts.unacknowledged_since(subject.id, since).await?;
        messages.extend(alerts.into_iter().map(ServerMessage::alert_notification));
        Ok(messages)
    }
}
