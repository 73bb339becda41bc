//! Alert path: reading ingestion, window evaluation and alert persistence.

pub mod pipeline;

pub use pipeline::{AlertPipeline, IngestReport};
