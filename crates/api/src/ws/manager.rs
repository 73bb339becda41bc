use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use herdwatch_core::types::{ObserverId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Why a message could not be handed to a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection {0} is not registered")]
    UnknownConnection(ObserverId),
    #[error("connection {0} is closed")]
    Closed(ObserverId),
}

/// Summary of a connection for status reporting.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub conn_id: ObserverId,
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections, keyed by observer id.
///
/// Thread-safe via interior `RwLock`; wrapped in `Arc` and shared across the
/// application.
pub struct WsManager {
    connections: RwLock<HashMap<ObserverId, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: ObserverId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Queue a message for one connection.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> Result<(), DeliveryError> {
        let conns = self.connections.read().await;
        let conn = conns
            .get(conn_id)
            .ok_or_else(|| DeliveryError::UnknownConnection(conn_id.to_string()))?;
        conn.sender
            .send(message)
            .map_err(|_| DeliveryError::Closed(conn_id.to_string()))
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Connections ordered by connect time.
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, conn)| ConnectionInfo {
                conn_id: id.clone(),
                connected_at: conn.connected_at,
            })
            .collect();
        infos.sort_by_key(|info| info.connected_at);
        infos
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
