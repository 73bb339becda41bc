//! Herdwatch event bus and notification delivery.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the domain event envelope (`alert.created`,
//!   `alert.acknowledged`).
//! - [`delivery`]: outbound notification channels implementing
//!   `herdwatch_core::notify::NotificationDispatcher`.

pub mod bus;
pub mod delivery;

pub use bus::{EventBus, PlatformEvent};
pub use delivery::log::LogDispatcher;
pub use delivery::webhook::{WebhookDispatcher, WebhookError};
