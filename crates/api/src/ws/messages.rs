//! JSON text frames exchanged with observers, tagged by `type`.

use axum::extract::ws::Message;
use herdwatch_core::alert::Alert;
use herdwatch_core::reading::Reading;
use herdwatch_core::types::DbId;
use serde::{Deserialize, Serialize, Serializer};

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Subscribe {
        subject_id: DbId,
        /// Caller identity used for the ownership check.
        requester_id: DbId,
    },
    Unsubscribe {
        subject_id: DbId,
    },
}

/// Server → client frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    ReadingUpdate {
        subject_id: DbId,
        #[serde(flatten)]
        reading: Reading,
    },
    AlertNotification(FramedAlert),
    /// The alert left the `new` state; displays stop showing it.
    AlertAcknowledged(FramedAlert),
    Subscribed {
        subject_id: DbId,
    },
    Unsubscribed {
        subject_id: DbId,
    },
    /// Sent only to the connection whose request failed.
    Error {
        message: String,
    },
}

/// An alert flattened into a frame. Its own `type` would collide with the
/// frame tag, so it is emitted as `alertType`.
#[derive(Debug, Clone, PartialEq)]
pub struct FramedAlert(pub Alert);

impl Serialize for FramedAlert {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut value = serde_json::to_value(&self.0).map_err(serde::ser::Error::custom)?;
        if let Some(fields) = value.as_object_mut() {
            if let Some(kind) = fields.remove("type") {
                fields.insert("alertType".to_string(), kind);
            }
        }
        value.serialize(serializer)
    }
}

impl ServerMessage {
    pub fn alert_notification(alert: Alert) -> Self {
        ServerMessage::AlertNotification(FramedAlert(alert))
    }

    pub fn alert_acknowledged(alert: Alert) -> Self {
        ServerMessage::AlertAcknowledged(FramedAlert(alert))
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Encode as a WebSocket text frame.
    pub fn to_ws(&self) -> Message {
        match serde_json::to_string(self) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode server message");
                Message::Text(r#"{"type":"error","message":"encoding failed"}"#.into())
            }
        }
    }
}
