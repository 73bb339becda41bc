//! Repository for the `subjects` table.

use herdwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::subject::{CreateSubject, SubjectRow};

/// Column list for `subjects` queries.
const COLUMNS: &str = "id, owner_id, tag_id, name, created_at, updated_at";

/// Provides lookups over registered subjects.
pub struct SubjectRepo;

impl SubjectRepo {
    /// Register a subject, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSubject) -> Result<SubjectRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO subjects (owner_id, tag_id, name) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SubjectRow>(&query)
            .bind(input.owner_id)
            .bind(&input.tag_id)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SubjectRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM subjects WHERE id = $1");
        sqlx::query_as::<_, SubjectRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Resolve the subject wearing `tag_id`.
    pub async fn find_by_tag(
        pool: &PgPool,
        tag_id: &str,
    ) -> Result<Option<SubjectRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM subjects WHERE tag_id = $1");
        sqlx::query_as::<_, SubjectRow>(&query)
            .bind(tag_id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's subjects ordered by name.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<SubjectRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM subjects WHERE owner_id = $1 ORDER BY name");
        sqlx::query_as::<_, SubjectRow>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }
}
