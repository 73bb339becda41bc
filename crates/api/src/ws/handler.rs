use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::realtime::SubscriptionHub;
use crate::state::AppState;
use crate::ws::manager::WsManager;
use crate::ws::messages::{ClientMessage, ServerMessage};

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// managed by two tasks (sender + receiver).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager, state.hub))
}

/// Manage a single observer connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Dispatches inbound subscribe/unsubscribe frames to the hub.
///   4. Drops every subscription of the connection on disconnect.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>, hub: Arc<SubscriptionHub>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                handle_text(&conn_id, text.as_str(), &hub, &ws_manager).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    let stopped = hub.disconnect(&conn_id).await;
    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, stopped_pollers = stopped.len(), "WebSocket disconnected");
}

async fn handle_text(conn_id: &str, text: &str, hub: &Arc<SubscriptionHub>, ws_manager: &WsManager) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "Malformed client frame");
            reply(ws_manager, conn_id, ServerMessage::error(format!("invalid message: {e}"))).await;
            return;
        }
    };

    match message {
        ClientMessage::Subscribe {
            subject_id,
            requester_id,
        } => {
            if let Err(e) = hub.subscribe(conn_id, subject_id, requester_id).await {
                tracing::info!(conn_id, subject_id, requester_id, error = %e, "Subscribe rejected");
                reply(ws_manager, conn_id, ServerMessage::error(e.to_string())).await;
            }
        }
        ClientMessage::Unsubscribe { subject_id } => {
            hub.unsubscribe(conn_id, subject_id).await;
        }
    }
}

async fn reply(ws_manager: &WsManager, conn_id: &str, message: ServerMessage) {
    if let Err(e) = ws_manager.send_to(conn_id, message.to_ws()).await {
        tracing::debug!(conn_id, error = %e, "Reply dropped");
    }
}
