//! Bus payloads published by the sensor fleet.
//!
//! Two message shapes travel over the bus:
//!
//! | Subject | Payload |
//! |---------|---------|
//! | `parking.{zone}.place_{id}` | [`SensorReading`] |
//! | `parking.summary` | [`FleetSummary`] |
//!
//! Field names are `snake_case` on the wire and must stay stable: the
//! ingestion service and the dashboard both read them by name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::SensorStatus;

/// Status snapshot of a single parking place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SensorReading {
    /// Place number within its zone (1-based).
    pub sensor_id: u32,
    /// Zone the place belongs to.
    pub zone: String,
    /// Current occupancy status.
    pub status: SensorStatus,
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
    /// Detection confidence in `[0.85, 1.0]`.
    pub confidence: f64,
}

/// Fleet-wide occupancy aggregate.
///
/// Always computed from the current state of every sensor, never
/// maintained incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FleetSummary {
    /// Number of places in the fleet.
    pub total_places: u32,
    /// Number of occupied places.
    pub occupied: u32,
    /// Number of free places.
    pub free: u32,
    /// `occupied / total_places * 100`, rounded to two decimals.
    pub occupancy_rate: f64,
    /// When the summary was computed.
    pub timestamp: DateTime<Utc>,
}

impl FleetSummary {
    /// Build a summary from raw counts.
    ///
    /// `free` is derived as `total_places - occupied` (saturating) so the
    /// three counts can never disagree.
    pub fn from_counts(total_places: u32, occupied: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            total_places,
            occupied,
            free: total_places.saturating_sub(occupied),
            occupancy_rate: occupancy_rate(occupied, total_places),
            timestamp,
        }
    }
}

/// Percentage of occupied places, rounded to two decimals.
///
/// Returns `0.0` for an empty fleet.
pub fn occupancy_rate(occupied: u32, total_places: u32) -> f64 {
    if total_places == 0 {
        return 0.0;
    }
    round_to_cents(f64::from(occupied) / f64::from(total_places) * 100.0)
}

/// Round to two decimal places.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
