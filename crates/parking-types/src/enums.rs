//! Enumeration types for the parking occupancy pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Occupancy status reported by a parking sensor.
///
/// Serialized in lowercase (`"occupied"` / `"free"`) on the bus, in the
/// database, and in API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum SensorStatus {
    /// A vehicle is parked in the place.
    Occupied,
    /// The place is empty.
    Free,
}

impl SensorStatus {
    /// Map an occupancy flag to its status.
    pub const fn from_occupied(occupied: bool) -> Self {
        if occupied { Self::Occupied } else { Self::Free }
    }

    /// Whether this status denotes an occupied place.
    pub const fn is_occupied(self) -> bool {
        matches!(self, Self::Occupied)
    }

    /// The canonical lowercase representation stored in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Occupied => "occupied",
            Self::Free => "free",
        }
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is neither `occupied` nor `free`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sensor status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for SensorStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "occupied" => Ok(Self::Occupied),
            "free" => Ok(Self::Free),
            other => Err(ParseStatusError(other.to_owned())),
        }
    }
}
