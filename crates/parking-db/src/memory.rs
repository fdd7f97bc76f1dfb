//! Process-local event store.
//!
//! Mirrors the `PostgreSQL` backend's semantics (monotonic ids, newest-first
//! recent events, per-hour averages rounded to cents, zone ordering with
//! a missing zone last) so tests and local runs behave like production.
//!
//! Tables are unbounded `Vec`s with no eviction: suitable for tests and
//! short local runs, not for a long-lived backend.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_types::{
    EventRecord, HourlyAverage, HourlySnapshot, ParkingEvent, SensorStatus, ZoneActivity,
    round_to_cents,
};
use tokio::sync::RwLock;

use crate::error::DbError;

#[derive(Debug, Default)]
struct Tables {
    events: Vec<EventRecord>,
    snapshots: Vec<HourlySnapshot>,
    last_event_id: i64,
    last_snapshot_id: i64,
}

/// In-memory event store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    tables: Arc<RwLock<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`DbError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    fn check_available(&self) -> Result<(), DbError> {
        if self.unavailable.load(Ordering::Acquire) {
            Err(DbError::Unavailable(String::from("memory store marked unavailable")))
        } else {
            Ok(())
        }
    }

    /// Every stored event in insertion order.
    pub async fn events(&self) -> Vec<EventRecord> {
        self.tables.read().await.events.clone()
    }

    /// Every stored hourly snapshot in insertion order.
    pub async fn snapshots(&self) -> Vec<HourlySnapshot> {
        self.tables.read().await.snapshots.clone()
    }

    /// Append an event, assigning the next id.
    pub async fn append_event(&self, event: ParkingEvent) -> Result<EventRecord, DbError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        tables.last_event_id = tables.last_event_id.saturating_add(1);
        let record = EventRecord::from_event(tables.last_event_id, event);
        tables.events.push(record.clone());
        Ok(record)
    }

    /// Append an hourly snapshot, returning its id.
    pub async fn append_hourly_snapshot(&self, snapshot: &HourlySnapshot) -> Result<i64, DbError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        tables.last_snapshot_id = tables.last_snapshot_id.saturating_add(1);
        tables.snapshots.push(snapshot.clone());
        Ok(tables.last_snapshot_id)
    }

    /// The `limit` highest-id events, newest first.
    pub async fn recent_events(&self, limit: u32) -> Result<Vec<EventRecord>, DbError> {
        self.check_available()?;
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        let tables = self.tables.read().await;
        Ok(tables.events.iter().rev().take(take).cloned().collect())
    }

    /// Mean occupancy per hour, ordered by hour.
    pub async fn hourly_averages(&self) -> Result<Vec<HourlyAverage>, DbError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut by_hour: BTreeMap<u32, (f64, u64)> = BTreeMap::new();
        for snapshot in &tables.snapshots {
            let entry = by_hour.entry(snapshot.hour).or_insert((0.0, 0));
            entry.0 += snapshot.occupancy_rate;
            entry.1 = entry.1.saturating_add(1);
        }
        Ok(by_hour
            .into_iter()
            .map(|(hour, (sum, samples))| HourlyAverage {
                hour,
                avg_occupancy: mean(sum, samples),
                samples,
            })
            .collect())
    }

    /// Per-zone event counts for events stamped at or after `cutoff`.
    ///
    /// Events without a timestamp never fall inside a window.
    pub async fn zone_activity_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ZoneActivity>, DbError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut named: BTreeMap<String, ZoneActivity> = BTreeMap::new();
        let mut unnamed: Option<ZoneActivity> = None;

        let recent = tables
            .events
            .iter()
            .filter(|e| e.timestamp.is_some_and(|ts| ts >= cutoff));
        for event in recent {
            let row = match &event.zone {
                Some(zone) => named
                    .entry(zone.clone())
                    .or_insert_with(|| empty_activity(Some(zone.clone()))),
                None => unnamed.get_or_insert_with(|| empty_activity(None)),
            };
            row.total_events = row.total_events.saturating_add(1);
            match event.status {
                Some(SensorStatus::Occupied) => {
                    row.occupied_events = row.occupied_events.saturating_add(1);
                }
                Some(SensorStatus::Free) => row.free_events = row.free_events.saturating_add(1),
                None => {}
            }
        }

        Ok(named.into_values().chain(unnamed).collect())
    }

    /// Succeeds unless the store is marked unavailable.
    pub fn ping(&self) -> Result<(), DbError> {
        self.check_available()
    }
}

const fn empty_activity(zone: Option<String>) -> ZoneActivity {
    ZoneActivity {
        zone,
        occupied_events: 0,
        free_events: 0,
        total_events: 0,
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(sum: f64, samples: u64) -> f64 {
    if samples == 0 {
        0.0
    } else {
        round_to_cents(sum / samples as f64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::EventStore;

    fn event(
        zone: Option<&str>,
        place_id: u32,
        status: SensorStatus,
        age: TimeDelta,
    ) -> ParkingEvent {
        ParkingEvent {
            timestamp: Some(Utc::now() - age),
            zone: zone.map(str::to_owned),
            place_id: Some(place_id),
            status: Some(status),
            confidence: Some(0.9),
        }
    }

    fn snapshot(hour: u32, rate: f64) -> HourlySnapshot {
        HourlySnapshot {
            timestamp: Utc::now(),
            hour,
            total_places: 24,
            occupied: 12,
            free: 12,
            occupancy_rate: rate,
        }
    }

    #[tokio::test]
    async fn recent_events_are_newest_first_and_limited() {
        let store = EventStore::Memory(MemoryEventStore::new());
        for place in 1..=4 {
            store
                .append_event(event(Some("Zone_A"), place, SensorStatus::Free, TimeDelta::zero()))
                .await
                .unwrap();
        }

        let recent = store.recent_events(3).await.unwrap();
        let places: Vec<Option<u32>> = recent.iter().map(|e| e.place_id).collect();
        assert_eq!(places, vec![Some(4), Some(3), Some(2)]);
        let ids: Vec<i64> = recent.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 3, 2]);

        assert_eq!(store.recent_events(100).await.unwrap().len(), 4);
        assert!(store.recent_events(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zone_window_excludes_old_events() {
        let store = EventStore::Memory(MemoryEventStore::new());
        store
            .append_event(event(Some("Zone_A"), 1, SensorStatus::Occupied, TimeDelta::hours(1)))
            .await
            .unwrap();
        store
            .append_event(event(Some("Zone_A"), 2, SensorStatus::Free, TimeDelta::hours(2)))
            .await
            .unwrap();
        store
            .append_event(event(Some("Zone_B"), 1, SensorStatus::Occupied, TimeDelta::days(2)))
            .await
            .unwrap();

        let zones = store.zone_activity(TimeDelta::days(1)).await.unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].zone.as_deref(), Some("Zone_A"));
        assert_eq!(zones[0].occupied_events, 1);
        assert_eq!(zones[0].free_events, 1);
        assert_eq!(zones[0].total_events, 2);
    }

    #[tokio::test]
    async fn zone_rows_are_sorted_with_missing_zone_last() {
        let store = EventStore::Memory(MemoryEventStore::new());
        for zone in [None, Some("Zone_C"), Some("Zone_A")] {
            store
                .append_event(event(zone, 1, SensorStatus::Occupied, TimeDelta::minutes(5)))
                .await
                .unwrap();
        }
        store
            .append_event(ParkingEvent {
                timestamp: None,
                zone: Some(String::from("Zone_B")),
                ..ParkingEvent::default()
            })
            .await
            .unwrap();

        let zones = store.zone_activity(TimeDelta::days(1)).await.unwrap();
        let names: Vec<Option<&str>> = zones.iter().map(|z| z.zone.as_deref()).collect();
        assert_eq!(names, vec![Some("Zone_A"), Some("Zone_C"), None]);
    }

    #[tokio::test]
    async fn hourly_averages_group_and_round() {
        let store = EventStore::Memory(MemoryEventStore::new());
        store.append_hourly_snapshot(&snapshot(14, 50.0)).await.unwrap();
        store.append_hourly_snapshot(&snapshot(9, 10.0)).await.unwrap();
        store.append_hourly_snapshot(&snapshot(14, 33.33)).await.unwrap();
        store.append_hourly_snapshot(&snapshot(14, 20.0)).await.unwrap();

        let averages = store.hourly_averages().await.unwrap();
        assert_eq!(averages.len(), 2);
        assert_eq!(averages[0].hour, 9);
        assert_eq!(averages[0].samples, 1);
        assert!((averages[0].avg_occupancy - 10.0).abs() < 1e-9);
        assert_eq!(averages[1].hour, 14);
        assert_eq!(averages[1].samples, 3);
        assert!((averages[1].avg_occupancy - 34.44).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let memory = MemoryEventStore::new();
        let store = EventStore::Memory(memory.clone());
        assert!(store.ping().await.is_ok());

        memory.set_unavailable(true);
        assert!(matches!(store.ping().await, Err(DbError::Unavailable(_))));
        assert!(store.append_event(ParkingEvent::default()).await.is_err());
        assert!(store.recent_events(10).await.is_err());
        assert!(memory.events().await.is_empty());

        memory.set_unavailable(false);
        assert!(store.append_event(ParkingEvent::default()).await.is_ok());
    }

    #[tokio::test]
    async fn clones_share_tables() {
        let memory = MemoryEventStore::new();
        let store = EventStore::Memory(memory.clone());
        store.append_hourly_snapshot(&snapshot(3, 5.0)).await.unwrap();
        assert_eq!(memory.snapshots().await.len(), 1);
    }
}
