use axum::routing::{get, post};
use axum::Router;

use crate::handlers::alerts;
use crate::state::AppState;

/// ```text
/// GET  /subjects/{id}/alerts     -> list_for_subject
/// GET  /owners/{id}/alerts       -> list_for_owner
/// POST /alerts/{id}/acknowledge  -> acknowledge
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subjects/{id}/alerts", get(alerts::list_for_subject))
        .route("/owners/{id}/alerts", get(alerts::list_for_owner))
        .route("/alerts/{id}/acknowledge", post(alerts::acknowledge))
}
