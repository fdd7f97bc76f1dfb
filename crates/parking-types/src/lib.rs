//! Shared type definitions for the parking occupancy pipeline.
//!
//! This crate is the single source of truth for every payload that crosses
//! a process boundary: the messages sensors publish on the bus, the records
//! the backend persists, and the aggregate rows the query API serves. Types
//! flow downstream to `TypeScript` via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`enums`] -- Occupancy status of a parking place
//! - [`messages`] -- Bus payloads (sensor readings, fleet summaries)
//! - [`records`] -- Persisted events, hourly snapshots, and query aggregates
//! - [`topics`] -- Subject grammar shared by publishers and the ingestion service

pub mod enums;
pub mod messages;
pub mod records;
pub mod topics;

// Re-export all public types at crate root for convenience.
pub use enums::{ParseStatusError, SensorStatus};
pub use messages::{FleetSummary, SensorReading, occupancy_rate, round_to_cents};
pub use records::{EventRecord, HourlyAverage, HourlySnapshot, ParkingEvent, ZoneActivity};
pub use topics::{
    SUMMARY_TOPIC, TOPIC_PREFIX, TopicKind, WILDCARD_TOPIC, is_valid_zone_token, sensor_topic,
};
