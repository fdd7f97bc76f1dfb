//! A single simulated parking-place sensor.
//!
//! A sensor's identity (`zone`, `place_id`) is fixed at construction. Its
//! only mutable state is the occupancy flag, which changes exclusively
//! through [`SensorModel::detect_change`]: a memoryless coin flip with
//! fixed probability per call, with no cooldown or debounce.

use chrono::Utc;
use parking_types::{SensorReading, SensorStatus, round_to_cents, sensor_topic};
use rand::Rng;

/// Per-tick probability that a sensor reports a change.
pub const DEFAULT_CHANGE_PROBABILITY: f64 = 0.1;

/// Lower bound of the simulated detection confidence.
pub const CONFIDENCE_MIN: f64 = 0.85;

/// Upper bound of the simulated detection confidence.
pub const CONFIDENCE_MAX: f64 = 1.0;

/// One parking place and its occupancy sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorModel {
    zone: String,
    place_id: u32,
    occupied: bool,
    topic: String,
}

impl SensorModel {
    /// Create a sensor with a known initial state.
    pub fn new(zone: &str, place_id: u32, occupied: bool) -> Self {
        Self {
            zone: zone.to_owned(),
            place_id,
            occupied,
            topic: sensor_topic(zone, place_id),
        }
    }

    /// Zone this place belongs to.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Place number within the zone.
    pub const fn place_id(&self) -> u32 {
        self.place_id
    }

    /// Whether a vehicle currently occupies the place.
    pub const fn is_occupied(&self) -> bool {
        self.occupied
    }

    /// Current occupancy as a status.
    pub const fn status(&self) -> SensorStatus {
        SensorStatus::from_occupied(self.occupied)
    }

    /// Subject this sensor publishes on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Simulate a vehicle arriving or leaving.
    ///
    /// With probability `probability` the occupancy flag is flipped and
    /// `true` is returned. Otherwise the state is untouched and `false` is
    /// returned. A probability outside `[0, 1]` saturates; `NaN` never
    /// flips.
    pub fn detect_change<R: Rng + ?Sized>(&mut self, rng: &mut R, probability: f64) -> bool {
        let roll: f64 = rng.random();
        if roll < probability {
            self.occupied = !self.occupied;
            true
        } else {
            false
        }
    }

    /// Read the sensor.
    ///
    /// Pure with respect to the sensor: only the random source advances.
    /// The confidence is drawn uniformly from `[0.85, 1.0]` and rounded to
    /// two decimals.
    pub fn snapshot<R: Rng + ?Sized>(&self, rng: &mut R) -> SensorReading {
        let confidence = round_to_cents(rng.random_range(CONFIDENCE_MIN..=CONFIDENCE_MAX));
        SensorReading {
            sensor_id: self.place_id,
            zone: self.zone.clone(),
            status: self.status(),
            timestamp: Utc::now(),
            confidence,
        }
    }
}
