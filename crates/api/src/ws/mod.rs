//! WebSocket infrastructure for real-time observers.
//!
//! Provides connection management, heartbeat, the wire protocol, and the
//! HTTP upgrade handler mounted at `/api/v1/ws`.

mod handler;
mod heartbeat;
pub mod manager;
pub mod messages;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use messages::{ClientMessage, ServerMessage};
