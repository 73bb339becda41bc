//! Ingestion pipeline.
//!
//! Each reading is persisted, buffered into its subject's window and, once the
//! window is full, evaluated against the rule table, redeliveries included. Every breach goes
//! through the cooldown gate and then the idempotent alert writer; created
//! alerts are announced on the event bus.

use std::sync::Arc;

use herdwatch_core::alert::{Alert, AlertCandidate, AlertType};
use herdwatch_core::classifier::classify;
use herdwatch_core::clock::Clock;
use herdwatch_core::cooldown::CooldownGate;
use herdwatch_core::error::CoreError;
use herdwatch_core::notify::NotificationDispatcher;
use herdwatch_core::reading::ReadingEvent;
use herdwatch_core::rules::RuleSet;
use herdwatch_core::store::{AlertStore, ReadingStore, StoreError, SubjectDirectory};
use herdwatch_core::types::DbId;
use herdwatch_core::window::WindowStore;
use herdwatch_core::writer::{AlertWriter, WriteOutcome};
use herdwatch_events::{EventBus, PlatformEvent};
use serde::Serialize;
use tokio::sync::Mutex;

/// What happened to one ingested reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub subject_id: DbId,
    pub window_len: usize,
    /// The window was full and the rule table was evaluated.
    pub evaluated: bool,
    /// The reading was already buffered and the window was left unchanged.
    /// A full window is still evaluated so a redelivery after a failed
    /// evaluation can raise the alert it lost.
    pub duplicate: bool,
    pub alerts: Vec<Alert>,
    /// Breaches that did not produce an alert because of a cooldown.
    pub suppressed: Vec<AlertType>,
}

pub struct AlertPipeline {
    windows: Mutex<WindowStore>,
    rules: RuleSet,
    gate: CooldownGate,
    writer: AlertWriter,
    subjects: Arc<dyn SubjectDirectory>,
    readings: Arc<dyn ReadingStore>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    reading_ttl: chrono::Duration,
}

impl AlertPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subjects: Arc<dyn SubjectDirectory>,
        readings: Arc<dyn ReadingStore>,
        alerts: Arc<dyn AlertStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        event_bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        window_capacity: usize,
        reading_ttl: chrono::Duration,
    ) -> Self {
        Self {
            windows: Mutex::new(WindowStore::new(window_capacity, Arc::clone(&clock))),
            rules: RuleSet::default(),
            gate: CooldownGate::new(Arc::clone(&alerts), Arc::clone(&clock)),
            writer: AlertWriter::new(alerts, dispatcher),
            subjects,
            readings,
            event_bus,
            clock,
            reading_ttl,
        }
    }

    /// Replace the default rule table.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Ingest one raw event.
    ///
    /// The reading is persisted before it touches the window, so a reading
    /// store failure leaves the window unchanged. An alert store failure
    /// during evaluation is returned after the remaining breaches were
    /// tried; the upstream source redelivers and the full window is
    /// evaluated again. The cooldown gate and the conditional insert keep
    /// that re-evaluation from raising an alert twice.
    pub async fn ingest(&self, event: ReadingEvent) -> Result<IngestReport, CoreError> {
        let reading = event.into_reading(self.clock.as_ref())?;
        let subject = self
            .subjects
            .find_by_tag(&reading.subject_tag_id)
            .await?
            .ok_or_else(|| CoreError::not_found("subject tag", &reading.subject_tag_id))?;

        let expires_at = (self.clock.now() + self.reading_ttl).timestamp();
        let stored = self.readings.insert(&reading, expires_at).await?;
        if !stored {
            tracing::debug!(
                subject_id = subject.id,
                timestamp = %reading.timestamp,
                "Reading already persisted"
            );
        }

        let outcome = self.windows.lock().await.ingest(&subject.tag_id, reading);

        let mut report = IngestReport {
            subject_id: subject.id,
            window_len: outcome.window.len(),
            evaluated: false,
            duplicate: outcome.duplicate,
            alerts: Vec::new(),
            suppressed: Vec::new(),
        };
        if !outcome.is_full {
            return Ok(report);
        }

        report.evaluated = true;
        let mut first_error = None;
        for breach in classify(&outcome.window, &self.rules) {
            let alert_type = breach.alert_type;
            let candidate = AlertCandidate {
                subject_id: subject.id,
                owner_id: subject.owner_id,
                tag_id: subject.tag_id.clone(),
                breach,
                timestamp: self.clock.now(),
            };
            match self.raise(&candidate).await {
                Ok(Some(alert)) => {
                    self.event_bus.publish(PlatformEvent::alert_created(&alert));
                    report.alerts.push(alert);
                }
                Ok(None) => report.suppressed.push(alert_type),
                Err(e) => {
                    tracing::warn!(
                        subject_id = subject.id,
                        alert_type = %alert_type,
                        error = %e,
                        "Alert evaluation failed"
                    );
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        tracing::debug!(
            subject_id = subject.id,
            duplicate = report.duplicate,
            alerts = report.alerts.len(),
            suppressed = report.suppressed.len(),
            "Window evaluated"
        );
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(report),
        }
    }

    /// Run one breach through the cooldown gate and the writer. `None` means
    /// it was suppressed by either.
    async fn raise(&self, candidate: &AlertCandidate) -> Result<Option<Alert>, StoreError> {
        let alert_type = candidate.breach.alert_type;
        if !self.gate.may_alert(candidate.subject_id, alert_type).await? {
            return Ok(None);
        }
        match self.writer.write(candidate).await? {
            WriteOutcome::Created(alert) => Ok(Some(alert)),
            WriteOutcome::Suppressed => Ok(None),
        }
    }

    /// Drop windows of tags that have been silent for `max_idle`.
    pub async fn sweep_idle(&self, max_idle: chrono::Duration) -> usize {
        self.windows.lock().await.evict_idle(max_idle)
    }

    /// Number of subjects with a buffered window.
    pub async fn tracked_subjects(&self) -> usize {
        self.windows.lock().await.len()
    }
}
