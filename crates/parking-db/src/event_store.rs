//! Append-only persistence for sensor events and hourly snapshots.
//!
//! [`EventStore`] is the handle the ingestion service writes through and
//! the query API reads through. It dispatches to one of two backends:
//!
//! - [`PgEventStore`] -- the `parking_events` and `hourly_stats` tables
//! - [`MemoryEventStore`] -- process-local tables for tests and local runs
//!
//! There is no update or delete operation on either backend.

use chrono::{DateTime, TimeDelta, Utc};
use parking_types::{
    EventRecord, HourlyAverage, HourlySnapshot, ParkingEvent, SensorStatus, ZoneActivity,
};
use sqlx::PgPool;

use crate::error::DbError;
use crate::memory::MemoryEventStore;

/// Window used by the zone activity query when none is given.
pub fn default_activity_window() -> TimeDelta {
    TimeDelta::days(1)
}

/// Handle to the event store, cheap to clone.
#[derive(Debug, Clone)]
pub enum EventStore {
    /// `PostgreSQL` tables.
    Postgres(PgEventStore),
    /// In-memory tables.
    Memory(MemoryEventStore),
}

impl EventStore {
    /// Append one sensor event and return it with its assigned id.
    pub async fn append_event(&self, event: ParkingEvent) -> Result<EventRecord, DbError> {
        match self {
            Self::Postgres(store) => store.append_event(event).await,
            Self::Memory(store) => store.append_event(event).await,
        }
    }

    /// Append one hourly snapshot and return its assigned id.
    pub async fn append_hourly_snapshot(&self, snapshot: &HourlySnapshot) -> Result<i64, DbError> {
        match self {
            Self::Postgres(store) => store.append_hourly_snapshot(snapshot).await,
            Self::Memory(store) => store.append_hourly_snapshot(snapshot).await,
        }
    }

    /// The `limit` most recently inserted events, newest first.
    pub async fn recent_events(&self, limit: u32) -> Result<Vec<EventRecord>, DbError> {
        match self {
            Self::Postgres(store) => store.recent_events(limit).await,
            Self::Memory(store) => store.recent_events(limit).await,
        }
    }

    /// Mean occupancy rate per hour of day, ordered by hour.
    pub async fn hourly_averages(&self) -> Result<Vec<HourlyAverage>, DbError> {
        match self {
            Self::Postgres(store) => store.hourly_averages().await,
            Self::Memory(store) => store.hourly_averages().await,
        }
    }

    /// Per-zone event counts over the trailing `window`.
    ///
    /// Only events whose timestamp is at or after `now - window` count.
    /// Rows are ordered by zone, with events lacking a zone last.
    pub async fn zone_activity(&self, window: TimeDelta) -> Result<Vec<ZoneActivity>, DbError> {
        let cutoff = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        match self {
            Self::Postgres(store) => store.zone_activity_since(cutoff).await,
            Self::Memory(store) => store.zone_activity_since(cutoff).await,
        }
    }

    /// Check that the backend is reachable.
    pub async fn ping(&self) -> Result<(), DbError> {
        match self {
            Self::Postgres(store) => store.ping().await,
            Self::Memory(store) => store.ping(),
        }
    }

    /// Backend name for logging.
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL backend
// ---------------------------------------------------------------------------

/// Event store over the `parking_events` and `hourly_stats` tables.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Create an event store bound to a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert one row into `parking_events`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn append_event(&self, event: ParkingEvent) -> Result<EventRecord, DbError> {
        let id: i64 = sqlx::query_scalar(
            r"INSERT INTO parking_events (timestamp, zone, place_id, status, confidence)
              VALUES ($1, $2, $3, $4, $5)
              RETURNING id",
        )
        .bind(event.timestamp)
        .bind(event.zone.as_deref())
        .bind(event.place_id.map(i64::from))
        .bind(event.status.map(SensorStatus::as_str))
        .bind(event.confidence)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = id, "Inserted parking event");
        Ok(EventRecord::from_event(id, event))
    }

    /// Insert one row into `hourly_stats`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn append_hourly_snapshot(&self, snapshot: &HourlySnapshot) -> Result<i64, DbError> {
        let id: i64 = sqlx::query_scalar(
            r"INSERT INTO hourly_stats
                  (timestamp, hour, total_places, occupied, free, occupancy_rate)
              VALUES ($1, $2, $3, $4, $5, $6)
              RETURNING id",
        )
        .bind(snapshot.timestamp)
        .bind(i64::from(snapshot.hour))
        .bind(i64::from(snapshot.total_places))
        .bind(i64::from(snapshot.occupied))
        .bind(i64::from(snapshot.free))
        .bind(snapshot.occupancy_rate)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = id, hour = snapshot.hour, "Inserted hourly snapshot");
        Ok(id)
    }

    /// Query the most recent events by insertion id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::Decode`] if a stored row holds an impossible value.
    pub async fn recent_events(&self, limit: u32) -> Result<Vec<EventRecord>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT id, timestamp, zone, place_id, status, confidence
              FROM parking_events
              ORDER BY id DESC
              LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventRecord::try_from).collect()
    }

    /// Query the mean occupancy rate per hour of day.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn hourly_averages(&self) -> Result<Vec<HourlyAverage>, DbError> {
        let rows = sqlx::query_as::<_, HourlyAverageRow>(
            r"SELECT hour,
                     ROUND(AVG(occupancy_rate)::NUMERIC, 2)::DOUBLE PRECISION AS avg_occupancy,
                     COUNT(*) AS samples
              FROM hourly_stats
              GROUP BY hour
              ORDER BY hour",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HourlyAverage::try_from).collect()
    }

    /// Query per-zone event counts for events at or after `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn zone_activity_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ZoneActivity>, DbError> {
        let rows = sqlx::query_as::<_, ZoneActivityRow>(
            r"SELECT zone,
                     COUNT(*) FILTER (WHERE status = 'occupied') AS occupied_events,
                     COUNT(*) FILTER (WHERE status = 'free') AS free_events,
                     COUNT(*) AS total_events
              FROM parking_events
              WHERE timestamp >= $1
              GROUP BY zone
              ORDER BY zone NULLS LAST",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ZoneActivity::from).collect())
    }

    /// Round-trip a trivial query.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the database is unreachable.
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A row from the `parking_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Auto-incremented event ID.
    pub id: i64,
    /// Sensor-reported time, if any.
    pub timestamp: Option<DateTime<Utc>>,
    /// Zone name, if any.
    pub zone: Option<String>,
    /// Place number, if any.
    pub place_id: Option<i64>,
    /// `occupied` or `free`, if any.
    pub status: Option<String>,
    /// Detection confidence, if any.
    pub confidence: Option<f64>,
}

impl TryFrom<EventRow> for EventRecord {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let place_id = row
            .place_id
            .map(|id| {
                u32::try_from(id)
                    .map_err(|e| DbError::Decode(format!("event {}: place_id {id}: {e}", row.id)))
            })
            .transpose()?;
        let status = row
            .status
            .as_deref()
            .map(|s| {
                s.parse::<SensorStatus>()
                    .map_err(|e| DbError::Decode(format!("event {}: {e}", row.id)))
            })
            .transpose()?;
        Ok(Self {
            id: row.id,
            timestamp: row.timestamp,
            zone: row.zone,
            place_id,
            status,
            confidence: row.confidence,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HourlyAverageRow {
    hour: i64,
    avg_occupancy: Option<f64>,
    samples: i64,
}

impl TryFrom<HourlyAverageRow> for HourlyAverage {
    type Error = DbError;

    fn try_from(row: HourlyAverageRow) -> Result<Self, Self::Error> {
        let hour = u32::try_from(row.hour)
            .map_err(|e| DbError::Decode(format!("hour {}: {e}", row.hour)))?;
        Ok(Self {
            hour,
            avg_occupancy: row.avg_occupancy.unwrap_or_default(),
            samples: u64::try_from(row.samples).unwrap_or_default(),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ZoneActivityRow {
    zone: Option<String>,
    occupied_events: i64,
    free_events: i64,
    total_events: i64,
}

impl From<ZoneActivityRow> for ZoneActivity {
    fn from(row: ZoneActivityRow) -> Self {
        Self {
            zone: row.zone,
            occupied_events: u64::try_from(row.occupied_events).unwrap_or_default(),
            free_events: u64::try_from(row.free_events).unwrap_or_default(),
            total_events: u64::try_from(row.total_events).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_decodes_into_record() {
        let row = EventRow {
            id: 9,
            timestamp: None,
            zone: Some(String::from("Zone_A")),
            place_id: Some(3),
            status: Some(String::from("free")),
            confidence: Some(0.9),
        };
        let record = EventRecord::try_from(row);
        assert!(matches!(
            record,
            Ok(EventRecord { id: 9, place_id: Some(3), status: Some(SensorStatus::Free), .. })
        ));
    }

    #[test]
    fn null_columns_decode_as_none() {
        let row = EventRow {
            id: 1,
            timestamp: None,
            zone: None,
            place_id: None,
            status: None,
            confidence: None,
        };
        let record = EventRecord::try_from(row);
        assert!(matches!(
            record,
            Ok(EventRecord { zone: None, place_id: None, status: None, .. })
        ));
    }

    #[test]
    fn impossible_values_are_decode_errors() {
        let negative = EventRow {
            id: 2,
            timestamp: None,
            zone: None,
            place_id: Some(-1),
            status: None,
            confidence: None,
        };
        assert!(matches!(EventRecord::try_from(negative), Err(DbError::Decode(_))));

        let unknown = EventRow {
            id: 3,
            timestamp: None,
            zone: None,
            place_id: None,
            status: Some(String::from("towed")),
            confidence: None,
        };
        assert!(matches!(EventRecord::try_from(unknown), Err(DbError::Decode(_))));
    }

    #[test]
    fn default_window_is_one_day() {
        assert_eq!(default_activity_window().num_hours(), 24);
    }
}
