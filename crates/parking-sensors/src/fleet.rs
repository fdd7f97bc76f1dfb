//! The fleet of sensors making up one parking lot.
//!
//! Sensors are kept in a flat vector in layout order (zones in
//! configuration order, places `1..=n` within each zone). That order is
//! the order changes are detected and published in.

use chrono::{DateTime, Utc};
use parking_core::ZoneConfig;
use parking_types::FleetSummary;
use rand::Rng;

use crate::sensor::SensorModel;

/// Every sensor in the parking lot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParkingFleet {
    sensors: Vec<SensorModel>,
}

impl ParkingFleet {
    /// Build the fleet from a zone layout.
    ///
    /// Each place starts occupied or free with equal probability,
    /// independently of every other place.
    pub fn from_zones<R: Rng + ?Sized>(zones: &[ZoneConfig], rng: &mut R) -> Self {
        let mut sensors = Vec::new();
        for zone in zones {
            for place_id in 1..=zone.places {
                sensors.push(SensorModel::new(&zone.name, place_id, rng.random_bool(0.5)));
            }
        }
        Self { sensors }
    }

    /// Build a fleet from explicit sensors, kept in the given order.
    pub const fn from_sensors(sensors: Vec<SensorModel>) -> Self {
        Self { sensors }
    }

    /// All sensors in fleet order.
    pub fn sensors(&self) -> &[SensorModel] {
        &self.sensors
    }

    /// Sensor at `index` in fleet order.
    pub fn sensor(&self, index: usize) -> Option<&SensorModel> {
        self.sensors.get(index)
    }

    /// Number of places.
    pub fn total_places(&self) -> u32 {
        u32::try_from(self.sensors.len()).unwrap_or(u32::MAX)
    }

    /// Number of currently occupied places.
    pub fn occupied_places(&self) -> u32 {
        let count = self.sensors.iter().filter(|s| s.is_occupied()).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Run one round of change detection over every sensor, in order.
    ///
    /// Returns the indices of the sensors that changed.
    pub fn detect_changes<R: Rng + ?Sized>(&mut self, rng: &mut R, probability: f64) -> Vec<usize> {
        self.sensors
            .iter_mut()
            .enumerate()
            .filter_map(|(index, sensor)| sensor.detect_change(rng, probability).then_some(index))
            .collect()
    }

    /// Aggregate the current state of every sensor.
    ///
    /// Counts are recomputed from scratch on every call, so two calls
    /// with no state change in between produce identical summaries.
    pub fn summary(&self, timestamp: DateTime<Utc>) -> FleetSummary {
        FleetSummary::from_counts(self.total_places(), self.occupied_places(), timestamp)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn layout() -> Vec<ZoneConfig> {
        vec![
            ZoneConfig::new("Zone_A", 8),
            ZoneConfig::new("Zone_B", 6),
            ZoneConfig::new("Zone_C", 10),
        ]
    }

    #[test]
    fn one_sensor_per_zone_and_index() {
        let mut rng = StdRng::seed_from_u64(1);
        let fleet = ParkingFleet::from_zones(&layout(), &mut rng);
        assert_eq!(fleet.total_places(), 24);

        let ids: Vec<(&str, u32)> = fleet
            .sensors()
            .iter()
            .map(|s| (s.zone(), s.place_id()))
            .collect();
        assert_eq!(ids.first(), Some(&("Zone_A", 1)));
        assert_eq!(ids.get(7), Some(&("Zone_A", 8)));
        assert_eq!(ids.get(8), Some(&("Zone_B", 1)));
        assert_eq!(ids.last(), Some(&("Zone_C", 10)));
    }

    #[test]
    fn initial_state_is_mixed() {
        // 240 places at 50/50: all-free or all-occupied would be a bug.
        let zones = vec![ZoneConfig::new("Zone_A", 240)];
        let mut rng = StdRng::seed_from_u64(5);
        let fleet = ParkingFleet::from_zones(&zones, &mut rng);
        let occupied = fleet.occupied_places();
        assert!(occupied > 80 && occupied < 160, "occupied = {occupied}");
    }

    #[test]
    fn summary_reflects_current_state() {
        let fleet = ParkingFleet::from_sensors(vec![
            SensorModel::new("Zone_A", 1, true),
            SensorModel::new("Zone_A", 2, false),
            SensorModel::new("Zone_A", 3, false),
        ]);
        let summary = fleet.summary(Utc::now());
        assert_eq!(summary.total_places, 3);
        assert_eq!(summary.occupied, 1);
        assert_eq!(summary.free, 2);
        assert!((summary.occupancy_rate - 33.33).abs() < 1e-9);
    }

    #[test]
    fn summary_is_idempotent_between_ticks() {
        let mut rng = StdRng::seed_from_u64(9);
        let fleet = ParkingFleet::from_zones(&layout(), &mut rng);
        let at = Utc::now();
        assert_eq!(fleet.summary(at), fleet.summary(at));
    }

    #[test]
    fn summary_tracks_changes() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut fleet = ParkingFleet::from_zones(&layout(), &mut rng);
        for _ in 0..20 {
            let before = fleet.occupied_places();
            let changed = fleet.detect_changes(&mut rng, 0.3);
            let after = fleet.summary(Utc::now());
            let expected = fleet.sensors().iter().filter(|s| s.is_occupied()).count();
            assert_eq!(u32::try_from(expected).ok(), Some(after.occupied));
            if changed.is_empty() {
                assert_eq!(after.occupied, before);
            }
        }
    }

    #[test]
    fn certain_change_touches_every_sensor_in_order() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut fleet = ParkingFleet::from_zones(&[ZoneConfig::new("Zone_A", 4)], &mut rng);
        let changed = fleet.detect_changes(&mut rng, 1.0);
        assert_eq!(changed, vec![0, 1, 2, 3]);
    }
}
