//! Event bus consumers that push to observers.
//!
//! The [`AlertRelay`] subscribes to the event bus and forwards created and
//! acknowledged alerts to the observers of the alert's subject.

pub mod relay;

pub use relay::AlertRelay;
