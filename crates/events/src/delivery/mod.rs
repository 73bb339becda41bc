//! Outbound notification channels.
//!
//! The alert writer hands every new alert to exactly one dispatcher. The
//! binary picks [`webhook::WebhookDispatcher`] when a webhook URL is
//! configured and falls back to [`log::LogDispatcher`] otherwise.

pub mod log;
pub mod webhook;
