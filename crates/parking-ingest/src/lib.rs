//! Ingestion of parking bus traffic into the event store.
//!
//! - [`payload`] -- lenient sensor and strict summary payload decoding
//! - [`service`] -- message classification and the hour watermark
//! - [`consumer`] -- the loop draining the subscription channel

pub mod consumer;
pub mod error;
pub mod payload;
pub mod service;

pub use consumer::{ConsumerStats, run_consumer};
pub use error::IngestError;
pub use payload::SummaryPayload;
pub use service::{Ingested, IngestionService};
