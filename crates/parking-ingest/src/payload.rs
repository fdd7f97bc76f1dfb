//! Decoding of inbound bus payloads.
//!
//! Sensor payloads are decoded leniently: the payload must be a JSON
//! object, but every field is optional and an absent field becomes a
//! null column. A field of the wrong type is treated as absent and
//! logged. The one exception is `status`: a status string that is neither
//! `occupied` nor `free` makes the whole message malformed.
//!
//! Summary payloads are strict: all four counts must be present.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone as _, Utc};
use parking_types::{ParkingEvent, SensorStatus};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::IngestError;

/// ISO 8601 without an offset, as `datetime.isoformat()` style producers emit.
const NAIVE_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Counts copied from a fleet summary into an hourly snapshot.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct SummaryPayload {
    /// Number of places in the fleet.
    pub total_places: u32,
    /// Occupied places.
    pub occupied: u32,
    /// Free places.
    pub free: u32,
    /// Percentage occupied.
    pub occupancy_rate: f64,
}

/// Raw sensor payload before per-field validation.
#[derive(Debug, serde::Deserialize)]
struct RawSensorPayload {
    #[serde(default)]
    zone: Value,
    #[serde(default)]
    sensor_id: Value,
    #[serde(default)]
    status: Value,
    #[serde(default)]
    confidence: Value,
    #[serde(default)]
    timestamp: Value,
}

/// Decode a sensor status payload into a storable event.
///
/// # Errors
///
/// Returns [`IngestError::Malformed`] if the payload is not a JSON object
/// or carries an unknown status.
pub fn decode_sensor_event(topic: &str, payload: &[u8]) -> Result<ParkingEvent, IngestError> {
    let object: Map<String, Value> =
        serde_json::from_slice(payload).map_err(|e| IngestError::malformed(topic, e))?;
    let raw: RawSensorPayload = serde_json::from_value(Value::Object(object))
        .map_err(|e| IngestError::malformed(topic, e))?;

    let status = match raw.status {
        Value::Null => None,
        Value::String(s) => Some(
            s.parse::<SensorStatus>()
                .map_err(|e| IngestError::malformed(topic, e))?,
        ),
        other => {
            return Err(IngestError::malformed(
                topic,
                format!("status must be a string, got {other}"),
            ));
        }
    };

    Ok(ParkingEvent {
        timestamp: timestamp_field(topic, raw.timestamp),
        zone: zone_field(topic, raw.zone),
        place_id: place_id_field(topic, raw.sensor_id),
        status,
        confidence: confidence_field(topic, raw.confidence),
    })
}

/// Decode a fleet summary payload.
///
/// # Errors
///
/// Returns [`IngestError::Malformed`] if the payload is not a JSON object
/// or any count is missing or out of range.
pub fn decode_summary(topic: &str, payload: &[u8]) -> Result<SummaryPayload, IngestError> {
    let object: Map<String, Value> =
        serde_json::from_slice(payload).map_err(|e| IngestError::malformed(topic, e))?;
    serde_json::from_value(Value::Object(object)).map_err(|e| IngestError::malformed(topic, e))
}

fn zone_field(topic: &str, value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(zone) => Some(zone),
        other => {
            warn!(topic = topic, value = %other, "ignoring non-string zone");
            None
        }
    }
}

fn place_id_field(topic: &str, value: Value) -> Option<u32> {
    if value.is_null() {
        return None;
    }
    let id = value.as_u64().and_then(|id| u32::try_from(id).ok());
    if id.is_none() {
        warn!(topic = topic, value = %value, "ignoring invalid sensor_id");
    }
    id
}

fn confidence_field(topic: &str, value: Value) -> Option<f64> {
    if value.is_null() {
        return None;
    }
    let confidence = value.as_f64();
    if confidence.is_none() {
        warn!(topic = topic, value = %value, "ignoring non-numeric confidence");
    }
    confidence
}

fn timestamp_field(topic: &str, value: Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Null => None,
        Value::String(raw) => {
            let parsed = parse_timestamp(&raw);
            if parsed.is_none() {
                warn!(topic = topic, timestamp = raw, "unparseable timestamp, storing null");
            }
            parsed
        }
        other => {
            warn!(topic = topic, value = %other, "ignoring non-string timestamp");
            None
        }
    }
}

/// Parse an RFC 3339 timestamp, or an ISO 8601 one without an offset.
///
/// Offset-less timestamps are read as the producer's local time, which is
/// assumed to be this host's zone.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, NAIVE_ISO_FORMAT)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}
