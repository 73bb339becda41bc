//! Herdwatch domain core.
//!
//! Pure evaluation logic (windows, rules, classification) plus the
//! store-facing pieces of the alert path (cooldown gate, idempotent writer)
//! and the subscription registry used by the real-time layer. Nothing in
//! here talks to the network or a database directly; collaborators are
//! reached through the traits in [`store`] and [`notify`].

pub mod alert;
pub mod classifier;
pub mod clock;
pub mod cooldown;
pub mod error;
pub mod notify;
pub mod reading;
pub mod registry;
pub mod rules;
pub mod store;
pub mod types;
pub mod window;
pub mod writer;
