//! Backend service binary: ingestion plus the query API in one process.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `parking-config.yaml` (or `PARKING_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the event store (`PostgreSQL` with migrations, or in-memory)
//! 4. Connect to NATS and subscribe to every parking subject (fatal on failure)
//! 5. Spawn the ingestion consumer
//! 6. Serve the query API until Ctrl-C, then drain and disconnect

mod error;

use std::sync::Arc;

use parking_api::{AppState, ServerConfig};
use parking_core::{MessageBus, NatsBus, ParkingConfig, StoreBackend, shutdown, telemetry};
use parking_db::{EventStore, MemoryEventStore, PostgresConfig, PostgresPool};
use parking_ingest::{IngestionService, run_consumer};
use parking_types::WILDCARD_TOPIC;
use tracing::{error, info, warn};

use crate::error::BackendError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = ParkingConfig::load().map_err(BackendError::from)?;

    // 2. Initialize structured logging.
    telemetry::init(&config.logging);
    info!("parking-backend starting");

    // 3. Open the event store.
    let (store, pool) = match config.ingestion.store {
        StoreBackend::Postgres => {
            let pool =
                PostgresPool::connect(&PostgresConfig::new(&config.infrastructure.postgres_url))
                    .await
                    .map_err(BackendError::from)?;
            pool.run_migrations().await.map_err(BackendError::from)?;
            info!("PostgreSQL connected, migrations applied");
            (EventStore::Postgres(pool.event_store()), Some(pool))
        }
        StoreBackend::Memory => {
            warn!("using in-memory store; unbounded and lost on exit, for short local runs only");
            (EventStore::Memory(MemoryEventStore::new()), None)
        }
    };

    // 4. Connect to the bus and subscribe.
    let nats = NatsBus::connect(&config.infrastructure.nats_url)
        .await
        .map_err(BackendError::from)?;
    let receiver = nats.subscribe(WILDCARD_TOPIC).await.map_err(BackendError::from)?;
    info!(subject = WILDCARD_TOPIC, "subscribed to parking topics");
    let bus = MessageBus::Nats(nats);

    // 5. Spawn the ingestion consumer.
    let signal = shutdown::on_ctrl_c();
    let service = IngestionService::starting_now(store.clone());
    let consumer = tokio::spawn(run_consumer(service, receiver, signal.clone()));

    // 6. Serve the query API until interrupted.
    let server_config = ServerConfig {
        host: config.infrastructure.api_host.clone(),
        port: config.infrastructure.api_port,
    };
    let state = Arc::new(AppState::new(store).with_bus(bus.clone()));
    let served = parking_api::start_server(&server_config, state, signal).await;

    // The consumer only watches Ctrl-C, so a failed server must stop it.
    if served.is_err() {
        consumer.abort();
    }
    match consumer.await {
        Ok(stats) => info!(
            events = stats.events,
            snapshots = stats.snapshots,
            skipped_summaries = stats.skipped_summaries,
            failures = stats.failures,
            "ingestion stopped"
        ),
        Err(e) => error!(error = %e, "ingestion task failed"),
    }
    if let Err(e) = bus.disconnect().await {
        warn!(error = %e, "bus disconnect failed");
    }
    if let Some(pool) = pool {
        pool.close().await;
    }

    served.map_err(BackendError::from)?;
    info!("parking-backend shutdown complete");
    Ok(())
}
