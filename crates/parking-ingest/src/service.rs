//! Classification and persistence of bus messages.
//!
//! Every message is either a fleet summary (exactly `parking.summary`) or
//! a sensor event (anything else under `parking.`). Sensor events are
//! appended unconditionally. Summaries feed the hour watermark: the first
//! summary observed after the consumer's wall-clock hour changes is
//! persisted as an hourly snapshot, and every other summary is dropped.
//! Hours in which no summary arrives are skipped, never back-filled.

use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use parking_core::BusMessage;
use parking_db::EventStore;
use parking_types::{EventRecord, HourlySnapshot, SensorStatus, TopicKind};
use tracing::{debug, info};

use crate::error::IngestError;
use crate::payload::{decode_sensor_event, decode_summary};

/// What happened to one ingested message.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    /// A sensor event was appended.
    Event(EventRecord),
    /// A summary opened a new hour and was persisted.
    HourlySnapshot(HourlySnapshot),
    /// A summary arrived within an hour that already has a snapshot.
    SummarySkipped {
        /// The consumer hour the summary arrived in.
        hour: u32,
    },
}

/// Consumes bus messages into the event store.
#[derive(Debug)]
pub struct IngestionService {
    store: EventStore,
    last_hourly_save: u32,
}

impl IngestionService {
    /// Create a service whose watermark starts at `start_hour`.
    ///
    /// Summaries arriving during `start_hour` are skipped; the first one
    /// after the hour changes is persisted.
    pub const fn new(store: EventStore, start_hour: u32) -> Self {
        Self {
            store,
            last_hourly_save: start_hour,
        }
    }

    /// Create a service whose watermark is the current local hour.
    pub fn starting_now(store: EventStore) -> Self {
        Self::new(store, Local::now().hour())
    }

    /// Hour of the last persisted snapshot (or the start hour).
    pub const fn last_hourly_save(&self) -> u32 {
        self.last_hourly_save
    }

    /// The store this service appends to.
    pub const fn store(&self) -> &EventStore {
        &self.store
    }

    /// Ingest one message, reading the consumer clock for summaries.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Malformed`] for undecodable payloads and
    /// [`IngestError::Store`] when the append fails.
    pub async fn handle(&mut self, msg: &BusMessage) -> Result<Ingested, IngestError> {
        self.handle_at(msg, Local::now().fixed_offset()).await
    }

    /// Ingest one message as if it arrived at `now`.
    ///
    /// The watermark only advances after the snapshot has been stored, so
    /// a failed write leaves the next summary of the same hour eligible.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub async fn handle_at(
        &mut self,
        msg: &BusMessage,
        now: DateTime<FixedOffset>,
    ) -> Result<Ingested, IngestError> {
        match TopicKind::classify(&msg.topic) {
            TopicKind::Summary => self.ingest_summary(msg, now).await,
            TopicKind::SensorEvent => self.ingest_event(msg).await,
        }
    }

    async fn ingest_event(&self, msg: &BusMessage) -> Result<Ingested, IngestError> {
        let event = decode_sensor_event(&msg.topic, &msg.payload)?;
        let record = self.store.append_event(event).await?;
        info!(
            id = record.id,
            zone = record.zone.as_deref().unwrap_or("-"),
            place_id = record.place_id,
            status = record.status.map(SensorStatus::as_str),
            "event recorded"
        );
        Ok(Ingested::Event(record))
    }

    async fn ingest_summary(
        &mut self,
        msg: &BusMessage,
        now: DateTime<FixedOffset>,
    ) -> Result<Ingested, IngestError> {
        let summary = decode_summary(&msg.topic, &msg.payload)?;
        let hour = now.hour();
        if hour == self.last_hourly_save {
            debug!(hour = hour, "summary within current hour, skipped");
            return Ok(Ingested::SummarySkipped { hour });
        }

        let snapshot = HourlySnapshot {
            timestamp: now.with_timezone(&Utc),
            hour,
            total_places: summary.total_places,
            occupied: summary.occupied,
            free: summary.free,
            occupancy_rate: summary.occupancy_rate,
        };
        self.store.append_hourly_snapshot(&snapshot).await?;
        info!(
            hour = hour,
            previous_hour = self.last_hourly_save,
            occupancy_rate = snapshot.occupancy_rate,
            "hourly snapshot saved"
        );
        self.last_hourly_save = hour;
        Ok(Ingested::HourlySnapshot(snapshot))
    }
}
