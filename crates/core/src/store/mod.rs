//! Contracts for the external collaborators the core consumes.
//!
//! The subject directory, reading store and alert store are implemented over
//! PostgreSQL in `herdwatch-db`; [`memory::MemoryStore`] implements all of
//! them in process for tests and local runs.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::alert::{Alert, AlertCandidate, AlertType, Severity, ThresholdSnapshot};
use crate::reading::Reading;
use crate::types::{DbId, Timestamp};

/// Failure talking to a backing store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or the query failed. Retrying on the
    /// next natural schedule is expected to help.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A row came back in a shape that could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// A monitored animal and the tag it wears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: DbId,
    pub owner_id: DbId,
    pub tag_id: String,
    pub name: String,
}

#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    async fn find_by_id(&self, id: DbId) -> Result<Option<Subject>, StoreError>;

    async fn find_by_tag(&self, tag_id: &str) -> Result<Option<Subject>, StoreError>;
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist a reading that ages out at `expires_at` (epoch seconds).
    ///
    /// Returns `false` when the same tag already has a reading at that
    /// timestamp.
    async fn insert(&self, reading: &Reading, expires_at: i64) -> Result<bool, StoreError>;

    async fn latest(&self, tag_id: &str) -> Result<Option<Reading>, StoreError>;

    /// Readings for `tag_id` with `from <= timestamp <= to`, oldest first.
    async fn between(
        &self,
        tag_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Reading>, StoreError>;

    /// Delete readings whose expiry marker is at or before `now_epoch_secs`.
    async fn purge_expired(&self, now_epoch_secs: i64) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Insert payload for an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub subject_id: DbId,
    pub owner_id: DbId,
    pub tag_id: String,
    pub timestamp: Timestamp,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub value: f64,
    pub threshold: ThresholdSnapshot,
    pub dedup_key: String,
}

impl From<&AlertCandidate> for NewAlert {
    fn from(candidate: &AlertCandidate) -> Self {
        Self {
            subject_id: candidate.subject_id,
            owner_id: candidate.owner_id,
            tag_id: candidate.tag_id.clone(),
            timestamp: candidate.timestamp,
            alert_type: candidate.breach.alert_type,
            severity: candidate.breach.severity,
            value: candidate.breach.value,
            threshold: candidate.breach.threshold,
            dedup_key: candidate.dedup_key(),
        }
    }
}

/// Result of a conditional acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub enum AckOutcome {
    Acknowledged(Alert),
    NotFound,
    AlreadyAcknowledged,
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Most recent alert of `alert_type` for the subject strictly after `since`.
    async fn latest_since(
        &self,
        subject_id: DbId,
        alert_type: AlertType,
        since: Timestamp,
    ) -> Result<Option<Alert>, StoreError>;

    /// Insert `alert` unless its dedup key already exists or the subject has
    /// an alert of the same type strictly after `cooldown_since`. Both checks
    /// and the insert happen atomically. Returns `None` when suppressed.
    async fn insert_if_clear(
        &self,
        alert: &NewAlert,
        cooldown_since: Timestamp,
    ) -> Result<Option<Alert>, StoreError>;

    /// Unacknowledged alerts for the subject triggered at or after `since`,
    /// newest first.
    async fn unacknowledged_since(
        &self,
        subject_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<Alert>, StoreError>;

    async fn list_for_subject(&self, subject_id: DbId, limit: i64)
        -> Result<Vec<Alert>, StoreError>;

    async fn list_for_owner(&self, owner_id: DbId, limit: i64) -> Result<Vec<Alert>, StoreError>;

    /// Transition `new -> acknowledged`.
    async fn acknowledge(
        &self,
        alert_id: DbId,
        acknowledged_by: DbId,
        at: Timestamp,
    ) -> Result<AckOutcome, StoreError>;
}
