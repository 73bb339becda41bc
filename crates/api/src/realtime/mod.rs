//! Display path: per-subject pollers that push the latest reading and
//! recent open alerts to subscribed observers.
//!
//! [`SubscriptionHub`] serializes every subscription change together with
//! the matching poller start/stop. [`FanoutDispatcher`] turns one payload
//! into one frame per observer.

pub mod fanout;
pub mod hub;
pub mod poller;
pub mod snapshot;

pub use fanout::{FanoutDispatcher, FanoutReport};
pub use hub::{HubStatus, SubjectStatus, SubscriptionHub};
pub use snapshot::SnapshotSource;
