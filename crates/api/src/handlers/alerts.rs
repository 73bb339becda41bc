//! Alert listings and acknowledgement.

use axum::extract::{Path, Query, State};
use axum::Json;
use herdwatch_core::alert::Alert;
use herdwatch_core::error::CoreError;
use herdwatch_core::store::AckOutcome;
use herdwatch_core::types::DbId;
use herdwatch_events::PlatformEvent;
use serde::Deserialize;

use super::readings::find_subject;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum alerts to return (default 50, capped at 200).
    pub limit: Option<i64>,
}

impl ListQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
    pub acknowledged_by: DbId,
}

/// GET /subjects/{id}/alerts
pub async fn list_for_subject(
    State(state): State<AppState>,
    Path(subject_id): Path<DbId>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<DataResponse<Vec<Alert>>>> {
    find_subject(&state, subject_id).await?;
    let alerts = state.alerts.list_for_subject(subject_id, query.limit()).await?;
    Ok(Json(DataResponse { data: alerts }))
}

/// GET /owners/{id}/alerts
pub async fn list_for_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<DbId>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<DataResponse<Vec<Alert>>>> {
    let alerts = state.alerts.list_for_owner(owner_id, query.limit()).await?;
    Ok(Json(DataResponse { data: alerts }))
}

/// POST /alerts/{id}/acknowledge
///
/// 404 when the alert does not exist, 409 when it was already acknowledged.
pub async fn acknowledge(
    State(state): State<AppState>,
    Path(alert_id): Path<DbId>,
    Json(input): Json<AcknowledgeRequest>,
) -> AppResult<Json<DataResponse<Alert>>> {
    let now = state.clock.now();
    match state
        .alerts
        .acknowledge(alert_id, input.acknowledged_by, now)
        .await?
    {
        AckOutcome::Acknowledged(alert) => {
            tracing::info!(
                alert_id,
                acknowledged_by = input.acknowledged_by,
                "Alert acknowledged"
            );
            state
                .event_bus
                .publish(PlatformEvent::alert_acknowledged(&alert, input.acknowledged_by));
            Ok(Json(DataResponse { data: alert }))
        }
        AckOutcome::NotFound => Err(AppError::Core(CoreError::not_found("alert", alert_id))),
        AckOutcome::AlreadyAcknowledged => Err(AppError::Core(CoreError::Conflict(format!(
            "alert {alert_id} is already acknowledged"
        )))),
    }
}
