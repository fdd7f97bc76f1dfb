//! Persisted records and query aggregates.
//!
//! Both tables are append-only: events are written once per ingested
//! sensor message and hourly snapshots at most once per hour transition.
//! Nothing in the pipeline updates or deletes a record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::SensorStatus;

/// A sensor status change as recorded by the ingestion service.
///
/// Every field is optional: a payload missing a field is still stored,
/// with that column left null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ParkingEvent {
    /// Timestamp reported by the sensor.
    pub timestamp: Option<DateTime<Utc>>,
    /// Zone the place belongs to.
    pub zone: Option<String>,
    /// Place number within the zone.
    pub place_id: Option<u32>,
    /// Reported occupancy status.
    pub status: Option<SensorStatus>,
    /// Detection confidence.
    pub confidence: Option<f64>,
}

/// A [`ParkingEvent`] read back from the store together with its row id.
///
/// Row ids increase with insertion order, which is what "most recent"
/// means for event queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventRecord {
    /// Auto-incremented row id.
    pub id: i64,
    /// Timestamp reported by the sensor.
    pub timestamp: Option<DateTime<Utc>>,
    /// Zone the place belongs to.
    pub zone: Option<String>,
    /// Place number within the zone.
    pub place_id: Option<u32>,
    /// Reported occupancy status.
    pub status: Option<SensorStatus>,
    /// Detection confidence.
    pub confidence: Option<f64>,
}

impl EventRecord {
    /// Attach a row id to an event.
    pub fn from_event(id: i64, event: ParkingEvent) -> Self {
        Self {
            id,
            timestamp: event.timestamp,
            zone: event.zone,
            place_id: event.place_id,
            status: event.status,
            confidence: event.confidence,
        }
    }
}

/// Fleet occupancy captured at the first summary observed in a new hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HourlySnapshot {
    /// Consumer wall-clock time when the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Consumer wall-clock hour (0-23).
    pub hour: u32,
    /// Number of places in the fleet.
    pub total_places: u32,
    /// Number of occupied places.
    pub occupied: u32,
    /// Number of free places.
    pub free: u32,
    /// Occupancy percentage copied from the summary.
    pub occupancy_rate: f64,
}

/// Average occupancy over all snapshots taken at a given hour of day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HourlyAverage {
    /// Hour of day (0-23).
    pub hour: u32,
    /// Mean occupancy rate, rounded to two decimals.
    pub avg_occupancy: f64,
    /// Number of snapshots averaged.
    pub samples: u64,
}

/// Event counts for one zone over a trailing time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ZoneActivity {
    /// Zone name; `None` groups events stored without a zone.
    pub zone: Option<String>,
    /// Events reporting `occupied`.
    pub occupied_events: u64,
    /// Events reporting `free`.
    pub free_events: u64,
    /// All events in the window, including those with no status.
    pub total_events: u64,
}
