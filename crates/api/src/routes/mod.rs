pub mod alerts;
pub mod health;
pub mod readings;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                   WebSocket (subscribe / unsubscribe)
///
/// /readings                             ingest (POST)
/// /subjects/{id}/readings               reading history (GET, ?minutes=)
///
/// /subjects/{id}/alerts                 alerts for a subject (GET, ?limit=)
/// /owners/{id}/alerts                   alerts for an owner (GET, ?limit=)
/// /alerts/{id}/acknowledge              acknowledge (POST)
///
/// /realtime/status                      subscriptions and pollers (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(readings::router())
        .merge(alerts::router())
        .route("/realtime/status", get(handlers::realtime::status))
}
