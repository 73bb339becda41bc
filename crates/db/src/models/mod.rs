//! Row structs for the herdwatch tables.
//!
//! Each submodule holds a `FromRow` struct matching the table and the
//! conversion into the matching `herdwatch_core` domain type.

pub mod alert;
pub mod reading;
pub mod subject;
