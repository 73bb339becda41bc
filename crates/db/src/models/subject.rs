//! Subject entity model.

use herdwatch_core::store::Subject;
use herdwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `subjects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubjectRow {
    pub id: DbId,
    pub owner_id: DbId,
    pub tag_id: String,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a subject.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubject {
    pub owner_id: DbId,
    pub tag_id: String,
    pub name: String,
}

impl From<SubjectRow> for Subject {
    fn from(row: SubjectRow) -> Self {
        Subject {
            id: row.id,
            owner_id: row.owner_id,
            tag_id: row.tag_id,
            name: row.name,
        }
    }
}
