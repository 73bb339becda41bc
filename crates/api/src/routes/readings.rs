use axum::routing::{get, post};
use axum::Router;

use crate::handlers::readings;
use crate::state::AppState;

/// ```text
/// POST /readings                 -> ingest
/// GET  /subjects/{id}/readings   -> list_for_subject
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/readings", post(readings::ingest))
        .route("/subjects/{id}/readings", get(readings::list_for_subject))
}
