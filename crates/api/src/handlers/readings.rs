//! Reading ingestion and history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use herdwatch_core::error::CoreError;
use herdwatch_core::reading::{Reading, ReadingEvent};
use herdwatch_core::store::Subject;
use herdwatch_core::types::DbId;
use serde::Deserialize;

use crate::engine::IngestReport;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_HISTORY_MINUTES: i64 = 60;
const MAX_HISTORY_MINUTES: i64 = 1440;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Minutes of history to return (1..=1440, default 60).
    pub minutes: Option<i64>,
}

/// POST /readings
///
/// Accepted readings return 202 with the ingest report. Store failures map to
/// 503 so the upstream source redelivers.
pub async fn ingest(
    State(state): State<AppState>,
    Json(event): Json<ReadingEvent>,
) -> AppResult<(StatusCode, Json<DataResponse<IngestReport>>)> {
    let report = state.pipeline.ingest(event).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: report })))
}

/// GET /subjects/{id}/readings?minutes=N
pub async fn list_for_subject(
    State(state): State<AppState>,
    Path(subject_id): Path<DbId>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<DataResponse<Vec<Reading>>>> {
    let minutes = query.minutes.unwrap_or(DEFAULT_HISTORY_MINUTES);
    if !(1..=MAX_HISTORY_MINUTES).contains(&minutes) {
        return Err(AppError::BadRequest(format!(
            "minutes must be between 1 and {MAX_HISTORY_MINUTES}"
        )));
    }

    let subject = find_subject(&state, subject_id).await?;
    let to = state.clock.now();
    let from = to - chrono::Duration::minutes(minutes);
    let readings = state.readings.between(&subject.tag_id, from, to).await?;
    Ok(Json(DataResponse { data: readings }))
}

/// Look up a subject or fail with 404.
pub(crate) async fn find_subject(state: &AppState, subject_id: DbId) -> AppResult<Subject> {
    state
        .subjects
        .find_by_id(subject_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("subject", subject_id)))
}
