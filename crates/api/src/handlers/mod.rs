//! HTTP request handlers, grouped by resource.

pub mod alerts;
pub mod readings;
pub mod realtime;
