//! In-process implementations of the collaborator traits.
//!
//! [`MemoryStore`] backs the subject directory, reading store and alert store
//! with plain vectors behind a mutex. It counts read queries and can be
//! switched into a failing mode, as a whole or for alerts only, which the
//! scheduler and pipeline tests rely on. [`RecordingDispatcher`] captures dispatched alerts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{
    AckOutcome, AlertStore, NewAlert, ReadingStore, StoreError, Subject, SubjectDirectory,
};
use crate::alert::{Alert, AlertStatus, AlertType};
use crate::notify::{DispatchError, NotificationDispatcher};
use crate::reading::Reading;
use crate::types::{DbId, Timestamp};

#[derive(Default)]
struct Inner {
    subjects: Vec<Subject>,
    readings: Vec<(Reading, i64)>,
    alerts: Vec<Alert>,
    dedup_keys: HashSet<String>,
    next_alert_id: DbId,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    reads: AtomicUsize,
    unavailable: AtomicBool,
    alerts_unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subjects(subjects: impl IntoIterator<Item = Subject>) -> Self {
        let store = Self::new();
        store.lock().subjects.extend(subjects);
        store
    }

    pub fn add_subject(&self, subject: Subject) {
        self.lock().subjects.push(subject);
    }

    /// Number of read queries served (or refused) so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// While set, every operation fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// While set, only the [`AlertStore`] operations fail.
    pub fn set_alerts_unavailable(&self, unavailable: bool) {
        self.alerts_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.lock().alerts.clone()
    }

    pub fn readings(&self, tag_id: &str) -> Vec<Reading> {
        self.lock()
            .readings
            .iter()
            .filter(|(r, _)| r.subject_tag_id == tag_id)
            .map(|(r, _)| r.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store offline".into()))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.lock())
    }

    fn write(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.check()?;
        Ok(self.lock())
    }

    fn check_alerts(&self) -> Result<(), StoreError> {
        if self.alerts_unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("alert table offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SubjectDirectory for MemoryStore {
    async fn find_by_id(&self, id: DbId) -> Result<Option<Subject>, StoreError> {
        Ok(self.read()?.subjects.iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_tag(&self, tag_id: &str) -> Result<Option<Subject>, StoreError> {
        Ok(self
            .read()?
            .subjects
            .iter()
            .find(|s| s.tag_id == tag_id)
            .cloned())
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert(&self, reading: &Reading, expires_at: i64) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        let exists = inner.readings.iter().any(|(r, _)| {
            r.subject_tag_id == reading.subject_tag_id && r.timestamp == reading.timestamp
        });
        if exists {
            return Ok(false);
        }
        inner.readings.push((reading.clone(), expires_at));
        Ok(true)
    }

    async fn latest(&self, tag_id: &str) -> Result<Option<Reading>, StoreError> {
        Ok(self
            .read()?
            .readings
            .iter()
            .filter(|(r, _)| r.subject_tag_id == tag_id)
            .max_by_key(|(r, _)| r.timestamp)
            .map(|(r, _)| r.clone()))
    }

    async fn between(
        &self,
        tag_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Reading>, StoreError> {
        let mut readings: Vec<Reading> = self
            .read()?
            .readings
            .iter()
            .filter(|(r, _)| r.subject_tag_id == tag_id && r.timestamp >= from && r.timestamp <= to)
            .map(|(r, _)| r.clone())
            .collect();
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }

    async fn purge_expired(&self, now_epoch_secs: i64) -> Result<u64, StoreError> {
        let mut inner = self.write()?;
        let before = inner.readings.len();
        inner.readings.retain(|(_, expires_at)| *expires_at > now_epoch_secs);
        Ok((before - inner.readings.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.check()
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn latest_since(
        &self,
        subject_id: DbId,
        alert_type: AlertType,
        since: Timestamp,
    ) -> Result<Option<Alert>, StoreError> {
        self.check_alerts()?;
        Ok(self
            .read()?
            .alerts
            .iter()
            .filter(|a| {
                a.subject_id == subject_id && a.alert_type == alert_type && a.timestamp > since
            })
            .max_by_key(|a| a.timestamp)
            .cloned())
    }

    async fn insert_if_clear(
        &self,
        alert: &NewAlert,
        cooldown_since: Timestamp,
    ) -> Result<Option<Alert>, StoreError> {
        self.check_alerts()?;
        let mut inner = self.write()?;
        let cooling_down = inner.alerts.iter().any(|a| {
            a.subject_id == alert.subject_id
                && a.alert_type == alert.alert_type
                && a.timestamp > cooldown_since
        });
        if cooling_down || inner.dedup_keys.contains(&alert.dedup_key) {
            return Ok(None);
        }

        inner.next_alert_id += 1;
        let created = Alert {
            alert_id: inner.next_alert_id,
            subject_id: alert.subject_id,
            owner_id: alert.owner_id,
            tag_id: alert.tag_id.clone(),
            timestamp: alert.timestamp,
            alert_type: alert.alert_type,
            severity: alert.severity,
            value: alert.value,
            threshold_snapshot: alert.threshold,
            status: AlertStatus::New,
            acknowledged_by: None,
            acknowledged_at: None,
        };
        inner.dedup_keys.insert(alert.dedup_key.clone());
        inner.alerts.push(created.clone());
        Ok(Some(created))
    }

    async fn unacknowledged_since(
        &self,
        subject_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<Alert>, StoreError> {
        self.check_alerts()?;
        let mut alerts: Vec<Alert> = self
            .read()?
            .alerts
            .iter()
            .filter(|a| {
                a.subject_id == subject_id && a.status == AlertStatus::New && a.timestamp >= since
            })
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(alerts)
    }

    async fn list_for_subject(
        &self,
        subject_id: DbId,
        limit: i64,
    ) -> Result<Vec<Alert>, StoreError> {
        self.check_alerts()?;
        let inner = self.read()?;
        Ok(newest_first(
            inner.alerts.iter().filter(|a| a.subject_id == subject_id),
            limit,
        ))
    }

    async fn list_for_owner(&self, owner_id: DbId, limit: i64) -> Result<Vec<Alert>, StoreError> {
        self.check_alerts()?;
        let inner = self.read()?;
        Ok(newest_first(
            inner.alerts.iter().filter(|a| a.owner_id == owner_id),
            limit,
        ))
    }

    async fn acknowledge(
        &self,
        alert_id: DbId,
        acknowledged_by: DbId,
        at: Timestamp,
    ) -> Result<AckOutcome, StoreError> {
        self.check_alerts()?;
        let mut inner = self.write()?;
        let Some(alert) = inner.alerts.iter_mut().find(|a| a.alert_id == alert_id) else {
            return Ok(AckOutcome::NotFound);
        };
        if alert.status == AlertStatus::Acknowledged {
            return Ok(AckOutcome::AlreadyAcknowledged);
        }
        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_by = Some(acknowledged_by);
        alert.acknowledged_at = Some(at);
        Ok(AckOutcome::Acknowledged(alert.clone()))
    }
}

fn newest_first<'a>(alerts: impl Iterator<Item = &'a Alert>, limit: i64) -> Vec<Alert> {
    let mut alerts: Vec<Alert> = alerts.cloned().collect();
    alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    alerts.truncate(limit.max(0) as usize);
    alerts
}

/// Dispatcher that remembers every alert it was asked to send.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Alert>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher whose every send fails (after recording the attempt).
    pub fn failing() -> Self {
        let dispatcher = Self::default();
        dispatcher.failing.store(true, Ordering::SeqCst);
        dispatcher
    }

    pub fn sent(&self) -> Vec<Alert> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, alert: &Alert) -> Result<(), DispatchError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::new("recording", "configured to fail"));
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}
