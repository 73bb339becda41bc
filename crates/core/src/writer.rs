//! Idempotent alert persistence.

use std::sync::Arc;

use crate::alert::{Alert, AlertCandidate};
use crate::notify::NotificationDispatcher;
use crate::store::{AlertStore, NewAlert, StoreError};

/// Outcome of [`AlertWriter::write`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Created(Alert),
    /// Another alert for the same subject, type and cooldown bucket already
    /// exists. Not an error.
    Suppressed,
}

/// Persists alerts at most once per `(subject, type, cooldown bucket)` and
/// requests a best-effort notification for each new one.
pub struct AlertWriter {
    alerts: Arc<dyn AlertStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl AlertWriter {
    pub fn new(alerts: Arc<dyn AlertStore>, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { alerts, dispatcher }
    }

    /// Conditionally insert the candidate.
    ///
    /// The cooldown is re-checked inside the insert, so racing evaluations
    /// that both passed the gate still persist a single alert.
    pub async fn write(&self, candidate: &AlertCandidate) -> Result<WriteOutcome, StoreError> {
        let alert_type = candidate.breach.alert_type;
        let cooldown_since = candidate.timestamp - alert_type.cooldown_chrono();
        let new_alert = NewAlert::from(candidate);

        match self.alerts.insert_if_clear(&new_alert, cooldown_since).await? {
            Some(alert) => {
                tracing::info!(
                    alert_id = alert.alert_id,
                    subject_id = alert.subject_id,
                    alert_type = %alert.alert_type,
                    severity = %alert.severity,
                    value = alert.value,
                    "Alert created"
                );
                self.dispatch_in_background(alert.clone());
                Ok(WriteOutcome::Created(alert))
            }
            None => {
                tracing::debug!(
                    subject_id = candidate.subject_id,
                    alert_type = %alert_type,
                    dedup_key = %new_alert.dedup_key,
                    "Alert suppressed (duplicate)"
                );
                Ok(WriteOutcome::Suppressed)
            }
        }
    }

    /// Fire-and-forget notification. A failure is logged and never touches
    /// the persisted alert.
    fn dispatch_in_background(&self, alert: Alert) {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.dispatch(&alert).await {
                tracing::warn!(
                    alert_id = alert.alert_id,
                    channel = dispatcher.channel_name(),
                    error = %e,
                    "Notification dispatch failed"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertType, Breach, Severity, ThresholdSnapshot};
    use crate::store::memory::{MemoryStore, RecordingDispatcher};
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    fn candidate(minute: i64) -> AlertCandidate {
        AlertCandidate {
            subject_id: 3,
            owner_id: 30,
            tag_id: "TAG-3".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
                + Duration::minutes(minute),
            breach: Breach {
                alert_type: AlertType::Temperature,
                value: 39.8,
                threshold: ThresholdSnapshot {
                    min: Some(37.5),
                    max: Some(39.5),
                },
                severity: Severity::Low,
            },
        }
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn second_breach_inside_cooldown_is_suppressed() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let writer = AlertWriter::new(store.clone(), dispatcher.clone());

        let first = writer.write(&candidate(0)).await.unwrap();
        assert_matches!(first, WriteOutcome::Created(ref a) if a.alert_type == AlertType::Temperature);

        let second = writer.write(&candidate(14)).await.unwrap();
        assert_eq!(second, WriteOutcome::Suppressed);

        assert_eq!(store.alerts().len(), 1);
        settle().await;
        assert_eq!(dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn breach_after_cooldown_creates_new_alert() {
        let store = Arc::new(MemoryStore::new());
        let writer = AlertWriter::new(store.clone(), Arc::new(RecordingDispatcher::new()));

        writer.write(&candidate(0)).await.unwrap();
        let later = writer.write(&candidate(16)).await.unwrap();
        assert_matches!(later, WriteOutcome::Created(_));
        assert_eq!(store.alerts().len(), 2);
    }

    #[tokio::test]
    async fn racing_writes_persist_one_alert() {
        let store = Arc::new(MemoryStore::new());
        let writer = Arc::new(AlertWriter::new(
            store.clone(),
            Arc::new(RecordingDispatcher::new()),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let writer = Arc::clone(&writer);
                tokio::spawn(async move { writer.write(&candidate(1)).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if let WriteOutcome::Created(_) = handle.await.unwrap().unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.alerts().len(), 1);
    }

    #[tokio::test]
    async fn dispatch_failure_keeps_the_alert() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(RecordingDispatcher::failing());
        let writer = AlertWriter::new(store.clone(), dispatcher.clone());

        let outcome = writer.write(&candidate(0)).await.unwrap();
        assert_matches!(outcome, WriteOutcome::Created(_));
        settle().await;
        assert_eq!(dispatcher.sent().len(), 1);
        assert_eq!(store.alerts().len(), 1);
    }

    #[tokio::test]
    async fn store_failure_is_an_error_not_a_suppression() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let writer = AlertWriter::new(store, Arc::new(RecordingDispatcher::new()));
        assert_matches!(
            writer.write(&candidate(0)).await,
            Err(StoreError::Unavailable(_))
        );
    }
}
