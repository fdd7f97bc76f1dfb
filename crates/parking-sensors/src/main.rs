//! Sensor simulator binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `parking-config.yaml` (or `PARKING_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the fleet from the zone layout with random initial occupancy
//! 4. Connect to NATS (fatal on failure)
//! 5. Run the tick loop until Ctrl-C or the configured duration elapses

use parking_core::{MessageBus, NatsBus, ParkingConfig, shutdown, telemetry};
use parking_sensors::{FleetSimulator, ParkingFleet, SimulatorError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = ParkingConfig::load().map_err(SimulatorError::from)?;

    // 2. Initialize structured logging.
    telemetry::init(&config.logging);
    info!("parking-sensors starting");
    info!(
        zones = config.zones.len(),
        total_places = config.total_places(),
        tick_interval_ms = config.simulator.tick_interval_ms,
        change_probability = config.simulator.change_probability,
        "Configuration loaded"
    );

    // 3. Build the fleet.
    let mut rng = StdRng::from_os_rng();
    let fleet = ParkingFleet::from_zones(&config.zones, &mut rng);
    for zone in &config.zones {
        info!(zone = zone.name, places = zone.places, "zone configured");
    }

    // 4. Connect to the bus.
    let bus = NatsBus::connect(&config.infrastructure.nats_url)
        .await
        .map_err(SimulatorError::from)?;

    // 5. Run until interrupted or the duration elapses.
    let signal = shutdown::on_ctrl_c();
    let simulator = FleetSimulator::new(fleet, MessageBus::Nats(bus), &config.simulator, rng);
    let report = simulator.run(signal).await;

    info!(
        end_reason = ?report.end_reason,
        ticks = report.ticks,
        "parking-sensors shutdown complete"
    );
    Ok(())
}
