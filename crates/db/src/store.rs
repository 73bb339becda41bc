//! [`PgStore`]: the PostgreSQL-backed collaborator implementation.

use async_trait::async_trait;
use herdwatch_core::alert::{Alert, AlertType};
use herdwatch_core::reading::Reading;
use herdwatch_core::store::{
    AckOutcome, AlertStore, NewAlert, ReadingStore, StoreError, Subject, SubjectDirectory,
};
use herdwatch_core::types::{DbId, Timestamp};

use crate::models::alert::AlertRow;
use crate::repositories::{AlertRepo, ReadingRepo, SubjectRepo};
use crate::DbPool;

/// Implements the core store traits on top of the repositories.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(err.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn to_alert(row: AlertRow) -> Result<Alert, StoreError> {
    let id = row.id;
    Alert::try_from(row).map_err(|e| StoreError::Corrupt(format!("alert {id}: {e}")))
}

fn to_alerts(rows: Vec<AlertRow>) -> Result<Vec<Alert>, StoreError> {
    rows.into_iter().map(to_alert).collect()
}

#[async_trait]
impl SubjectDirectory for PgStore {
    async fn find_by_id(&self, id: DbId) -> Result<Option<Subject>, StoreError> {
        let row = SubjectRepo::find_by_id(&self.pool, id)
            .await
            .map_err(store_error)?;
        Ok(row.map(Subject::from))
    }

    async fn find_by_tag(&self, tag_id: &str) -> Result<Option<Subject>, StoreError> {
        let row = SubjectRepo::find_by_tag(&self.pool, tag_id)
            .await
            .map_err(store_error)?;
        Ok(row.map(Subject::from))
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn insert(&self, reading: &Reading, expires_at: i64) -> Result<bool, StoreError> {
        ReadingRepo::insert(&self.pool, reading, expires_at)
            .await
            .map_err(store_error)
    }

    async fn latest(&self, tag_id: &str) -> Result<Option<Reading>, StoreError> {
        let row = ReadingRepo::latest_for_tag(&self.pool, tag_id)
            .await
            .map_err(store_error)?;
        Ok(row.map(Reading::from))
    }

    async fn between(
        &self,
        tag_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Reading>, StoreError> {
        let rows = ReadingRepo::list_between(&self.pool, tag_id, from, to)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Reading::from).collect())
    }

    async fn purge_expired(&self, now_epoch_secs: i64) -> Result<u64, StoreError> {
        ReadingRepo::delete_expired(&self.pool, now_epoch_secs)
            .await
            .map_err(store_error)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(store_error)
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn latest_since(
        &self,
        subject_id: DbId,
        alert_type: AlertType,
        since: Timestamp,
    ) -> Result<Option<Alert>, StoreError> {
        AlertRepo::latest_since(&self.pool, subject_id, alert_type, since)
            .await
            .map_err(store_error)?
            .map(to_alert)
            .transpose()
    }

    async fn insert_if_clear(
        &self,
        alert: &NewAlert,
        cooldown_since: Timestamp,
    ) -> Result<Option<Alert>, StoreError> {
        AlertRepo::insert_if_clear(&self.pool, alert, cooldown_since)
            .await
            .map_err(store_error)?
            .map(to_alert)
            .transpose()
    }

    async fn unacknowledged_since(
        &self,
        subject_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<Alert>, StoreError> {
        let rows = AlertRepo::list_unacknowledged_since(&self.pool, subject_id, since)
            .await
            .map_err(store_error)?;
        to_alerts(rows)
    }

    async fn list_for_subject(
        &self,
        subject_id: DbId,
        limit: i64,
    ) -> Result<Vec<Alert>, StoreError> {
        let rows = AlertRepo::list_by_subject(&self.pool, subject_id, limit)
            .await
            .map_err(store_error)?;
        to_alerts(rows)
    }

    async fn list_for_owner(&self, owner_id: DbId, limit: i64) -> Result<Vec<Alert>, StoreError> {
        let rows = AlertRepo::list_by_owner(&self.pool, owner_id, limit)
            .await
            .map_err(store_error)?;
        to_alerts(rows)
    }

    async fn acknowledge(
        &self,
        alert_id: DbId,
        acknowledged_by: DbId,
        at: Timestamp,
    ) -> Result<AckOutcome, StoreError> {
        if let Some(row) = AlertRepo::acknowledge(&self.pool, alert_id, acknowledged_by, at)
            .await
            .map_err(store_error)?
        {
            return Ok(AckOutcome::Acknowledged(to_alert(row)?));
        }

        // Nothing updated: either the alert does not exist or it was already
        // acknowledged.
        let existing = AlertRepo::find_by_id(&self.pool, alert_id)
            .await
            .map_err(store_error)?;
        Ok(match existing {
            Some(_) => AckOutcome::AlreadyAcknowledged,
            None => AckOutcome::NotFound,
        })
    }
}
