//! JSON response envelopes.
//!
//! Every body carries `success`. The dashboard consumes these shapes, so
//! they are exported as TypeScript bindings alongside the record types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_types::{EventRecord, HourlyAverage, SensorStatus, ZoneActivity};
use serde::Serialize;
use ts_rs::TS;

/// `GET /` body.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IndexResponse {
    /// Always `true`.
    pub success: bool,
    /// Service banner.
    pub message: String,
    /// API version.
    pub version: String,
    /// Path to description of every data endpoint.
    pub endpoints: BTreeMap<String, String>,
}

/// One event as listed by `GET /api/events`.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventView {
    /// Sensor-reported time.
    pub timestamp: Option<DateTime<Utc>>,
    /// Zone name.
    pub zone: Option<String>,
    /// Place number within the zone.
    pub place_id: Option<u32>,
    /// Reported occupancy.
    pub status: Option<SensorStatus>,
}

impl From<EventRecord> for EventView {
    fn from(record: EventRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            zone: record.zone,
            place_id: record.place_id,
            status: record.status,
        }
    }
}

/// `GET /api/events` body.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventsResponse {
    /// Always `true`.
    pub success: bool,
    /// Number of events returned.
    pub count: usize,
    /// Events, newest first.
    pub events: Vec<EventView>,
}

/// `GET /api/stats/hourly` body.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HourlyStatsResponse {
    /// Always `true`.
    pub success: bool,
    /// Averages ordered by hour.
    pub statistics: Vec<HourlyAverage>,
}

/// `GET /api/stats/zones` body.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ZonesResponse {
    /// Always `true`.
    pub success: bool,
    /// Per-zone activity over the last day.
    pub zones: Vec<ZoneActivity>,
}

/// `connected` or `disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ConnectionStatus {
    /// Reachable.
    Connected,
    /// Unreachable or absent.
    Disconnected,
}

impl ConnectionStatus {
    /// Map a reachability flag.
    pub const fn from_flag(connected: bool) -> Self {
        if connected {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }
}

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum HealthStatus {
    /// Store and bus both connected.
    Healthy,
    /// At least one dependency is down.
    Degraded,
}

/// `GET /api/health` body.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HealthResponse {
    /// Always `true`: the API itself answered.
    pub success: bool,
    /// Aggregate status.
    pub status: HealthStatus,
    /// Event store reachability.
    pub database: ConnectionStatus,
    /// Bus reachability. The key name is what the dashboard reads.
    pub mqtt: ConnectionStatus,
    /// Time the check ran.
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    /// Build a report from the two dependency checks.
    pub fn from_checks(database: bool, bus: bool, timestamp: DateTime<Utc>) -> Self {
        let status = if database && bus {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        Self {
            success: true,
            status,
            database: ConnectionStatus::from_flag(database),
            mqtt: ConnectionStatus::from_flag(bus),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_is_degraded_when_any_check_fails() {
        let now = Utc::now();
        assert_eq!(HealthResponse::from_checks(true, true, now).status, HealthStatus::Healthy);
        assert_eq!(HealthResponse::from_checks(false, true, now).status, HealthStatus::Degraded);
        let report = HealthResponse::from_checks(true, false, now);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.database, ConnectionStatus::Connected);
        assert_eq!(report.mqtt, ConnectionStatus::Disconnected);
    }

    #[test]
    fn event_view_drops_id_and_confidence() {
        let record = EventRecord {
            id: 3,
            timestamp: None,
            zone: Some(String::from("Zone_A")),
            place_id: Some(2),
            status: Some(SensorStatus::Occupied),
            confidence: Some(0.9),
        };
        let value = serde_json::to_value(EventView::from(record)).unwrap_or_default();
        let keys: Vec<&String> = value.as_object().map(|o| o.keys().collect()).unwrap_or_default();
        assert_eq!(keys, vec!["place_id", "status", "timestamp", "zone"]);
    }

    #[test]
    fn export_bindings() {
        let _ = IndexResponse::export_all();
        let _ = EventsResponse::export_all();
        let _ = HourlyStatsResponse::export_all();
        let _ = ZonesResponse::export_all();
        let _ = HealthResponse::export_all();
    }
}
