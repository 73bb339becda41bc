//! Alert entity model.
//!
//! Enum-valued columns are stored as text and parsed back on the way out, so
//! a row with an unknown value surfaces as an error instead of a panic.

use herdwatch_core::alert::{Alert, ThresholdSnapshot};
use herdwatch_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use sqlx::types::Json;

/// A row from the `alerts` table.
#[derive(Debug, Clone, FromRow)]
pub struct AlertRow {
    pub id: DbId,
    pub subject_id: DbId,
    pub owner_id: DbId,
    pub tag_id: String,
    pub triggered_at: Timestamp,
    pub alert_type: String,
    pub severity: String,
    pub value: f64,
    pub threshold_snapshot: Json<ThresholdSnapshot>,
    pub status: String,
    pub acknowledged_by: Option<DbId>,
    pub acknowledged_at: Option<Timestamp>,
    pub dedup_key: String,
}

impl TryFrom<AlertRow> for Alert {
    type Error = String;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(Alert {
            alert_id: row.id,
            subject_id: row.subject_id,
            owner_id: row.owner_id,
            tag_id: row.tag_id,
            timestamp: row.triggered_at,
            alert_type: row.alert_type.parse()?,
            severity: row.severity.parse()?,
            value: row.value,
            threshold_snapshot: row.threshold_snapshot.0,
            status: row.status.parse()?,
            acknowledged_by: row.acknowledged_by,
            acknowledged_at: row.acknowledged_at,
        })
    }
}
