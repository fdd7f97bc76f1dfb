//! Data layer for the parking occupancy pipeline.
//!
//! Two append-only tables back the whole system: raw sensor events and
//! hourly occupancy snapshots. The ingestion service only appends; the
//! query API only reads.
//!
//! ```text
//! IngestionService --append--> EventStore <--query-- QueryAPI
//!                                  |
//!                                  +-- PgEventStore     (PostgreSQL)
//!                                  +-- MemoryEventStore (tests, local runs)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and migrations
//! - [`event_store`] -- The store handle and its `PostgreSQL` backend
//! - [`memory`] -- In-memory backend
//! - [`error`] -- Shared error types

pub mod error;
pub mod event_store;
pub mod memory;
pub mod postgres;

// Re-export primary types for convenience.
pub use error::DbError;
pub use event_store::{EventRow, EventStore, PgEventStore, default_activity_window};
pub use memory::MemoryEventStore;
pub use postgres::{PostgresConfig, PostgresPool};
