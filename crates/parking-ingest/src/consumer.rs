//! The ingestion consumer loop.
//!
//! One task reads the subscription channel and hands each message to the
//! [`IngestionService`] in arrival order. Nothing a single message does can
//! end the loop: malformed payloads and store failures are logged and
//! counted, then the next message is read.

use parking_core::BusReceiver;
use parking_core::shutdown::{self, ShutdownSignal};
use tracing::{error, info, warn};

use crate::error::IngestError;
use crate::service::{Ingested, IngestionService};

/// Totals for one consumer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Sensor events appended.
    pub events: u64,
    /// Hourly snapshots appended.
    pub snapshots: u64,
    /// Summaries dropped by the hour watermark.
    pub skipped_summaries: u64,
    /// Messages dropped as malformed or because the store failed.
    pub failures: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: &Result<Ingested, IngestError>) {
        let counter = match outcome {
            Ok(Ingested::Event(_)) => &mut self.events,
            Ok(Ingested::HourlySnapshot(_)) => &mut self.snapshots,
            Ok(Ingested::SummarySkipped { .. }) => &mut self.skipped_summaries,
            Err(_) => &mut self.failures,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Consume messages until the channel closes or shutdown is requested.
///
/// A message already being handled when shutdown fires is finished first.
pub async fn run_consumer(
    mut service: IngestionService,
    mut rx: BusReceiver,
    mut shutdown: ShutdownSignal,
) -> ConsumerStats {
    let mut stats = ConsumerStats::default();
    info!(
        store = service.store().backend_name(),
        start_hour = service.last_hourly_save(),
        "ingestion consumer started"
    );

    loop {
        let msg = tokio::select! {
            biased;
            () = shutdown::requested(&mut shutdown) => {
                info!("ingestion consumer stopping on shutdown");
                break;
            }
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => {
                    info!("subscription closed, ingestion consumer stopping");
                    break;
                }
            },
        };

        let outcome = service.handle(&msg).await;
        match &outcome {
            Err(e @ IngestError::Malformed { .. }) => {
                warn!(topic = msg.topic, error = %e, "dropping malformed message");
            }
            Err(e @ IngestError::Store(_)) => {
                error!(topic = msg.topic, error = %e, "failed to persist message");
            }
            Ok(_) => {}
        }
        stats.record(&outcome);
    }

    info!(
        events = stats.events,
        snapshots = stats.snapshots,
        skipped_summaries = stats.skipped_summaries,
        failures = stats.failures,
        "ingestion consumer finished"
    );
    stats
}
