use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::realtime::HubStatus;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeStatus {
    pub connections: usize,
    #[serde(flatten)]
    pub hub: HubStatus,
}

/// GET /realtime/status
pub async fn status(State(state): State<AppState>) -> Json<DataResponse<RealtimeStatus>> {
    let connections = state.ws_manager.connection_count().await;
    let hub = state.hub.status().await;
    Json(DataResponse {
        data: RealtimeStatus { connections, hub },
    })
}
