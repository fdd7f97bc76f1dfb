//! Fleet tick loop.
//!
//! [`FleetSimulator::run`] drives the fleet at a fixed interval until the
//! optional duration elapses or shutdown is requested:
//!
//! 1. Publish every sensor's status, then one fleet summary
//!    ([`publish_initial_state`](FleetSimulator::publish_initial_state)).
//! 2. On each tick, roll every sensor in fleet order, publish each change,
//!    and publish a fresh summary if anything changed.
//! 3. Disconnect the bus once the loop ends, or when the run is dropped.
//!
//! Publish failures never stop the simulation. They are logged and
//! counted in the [`SimulationReport`].

use std::time::Duration;

use chrono::Utc;
use parking_core::shutdown::{self, ShutdownSignal};
use parking_core::{MessageBus, ScopedBus, SimulatorConfig};
use parking_types::SUMMARY_TOPIC;
use rand::Rng;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::fleet::ParkingFleet;

/// Why the simulation loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The configured run duration elapsed.
    DurationElapsed,
    /// Shutdown was requested.
    Interrupted,
}

/// Totals for one simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    /// Ticks executed (the initial publish is not a tick).
    pub ticks: u64,
    /// Sensor changes detected across all ticks.
    pub changes: u64,
    /// Fleet summaries successfully published, including the initial one.
    pub summaries_published: u64,
    /// Publishes that failed.
    pub publish_failures: u64,
    /// Why the loop stopped.
    pub end_reason: EndReason,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: u64,
    changes: u64,
    summaries_published: u64,
    publish_failures: u64,
}

/// Drives a [`ParkingFleet`] and publishes its changes on a [`MessageBus`].
#[derive(Debug)]
pub struct FleetSimulator<R> {
    fleet: ParkingFleet,
    bus: ScopedBus,
    rng: R,
    tick_interval: Duration,
    change_probability: f64,
    duration: Option<Duration>,
    counters: Counters,
}

impl<R: Rng + Send> FleetSimulator<R> {
    /// Create a simulator over `fleet`, publishing on `bus`.
    pub fn new(fleet: ParkingFleet, bus: MessageBus, config: &SimulatorConfig, rng: R) -> Self {
        Self {
            fleet,
            bus: ScopedBus::new(bus),
            rng,
            tick_interval: config.tick_interval(),
            change_probability: config.change_probability,
            duration: config.duration(),
            counters: Counters::default(),
        }
    }

    /// The simulated fleet.
    pub const fn fleet(&self) -> &ParkingFleet {
        &self.fleet
    }

    /// Publish every sensor's current status, then one fleet summary.
    ///
    /// Runs unconditionally, so subscribers see the full lot before any
    /// tick happens.
    pub async fn publish_initial_state(&mut self) {
        info!(
            total_places = self.fleet.total_places(),
            occupied = self.fleet.occupied_places(),
            "publishing initial fleet state"
        );
        for sensor in self.fleet.sensors() {
            let reading = sensor.snapshot(&mut self.rng);
            info!(
                zone = sensor.zone(),
                place_id = sensor.place_id(),
                status = %reading.status,
                "initial place state"
            );
            if let Err(e) = self.bus.bus().publish_json(sensor.topic(), &reading).await {
                warn!(topic = sensor.topic(), error = %e, "failed to publish sensor status");
                self.counters.publish_failures = self.counters.publish_failures.saturating_add(1);
            }
        }
        self.publish_summary().await;
    }

    /// Run one tick and return how many sensors changed.
    pub async fn tick(&mut self) -> usize {
        self.counters.ticks = self.counters.ticks.saturating_add(1);
        let changed = self
            .fleet
            .detect_changes(&mut self.rng, self.change_probability);

        for &index in &changed {
            let Some(sensor) = self.fleet.sensor(index) else {
                continue;
            };
            let reading = sensor.snapshot(&mut self.rng);
            info!(
                zone = sensor.zone(),
                place_id = sensor.place_id(),
                status = %reading.status,
                confidence = reading.confidence,
                "place status changed"
            );
            if let Err(e) = self.bus.bus().publish_json(sensor.topic(), &reading).await {
                warn!(topic = sensor.topic(), error = %e, "failed to publish sensor status");
                self.counters.publish_failures = self.counters.publish_failures.saturating_add(1);
            }
        }

        let count = changed.len();
        self.counters.changes = self
            .counters
            .changes
            .saturating_add(u64::try_from(count).unwrap_or(u64::MAX));
        if count > 0 {
            self.publish_summary().await;
        } else {
            debug!(tick = self.counters.ticks, "no changes this tick");
        }
        count
    }

    async fn publish_summary(&mut self) {
        let summary = self.fleet.summary(Utc::now());
        match self.bus.bus().publish_json(SUMMARY_TOPIC, &summary).await {
            Ok(()) => {
                self.counters.summaries_published =
                    self.counters.summaries_published.saturating_add(1);
                info!(
                    total_places = summary.total_places,
                    occupied = summary.occupied,
                    free = summary.free,
                    occupancy_rate = summary.occupancy_rate,
                    "fleet summary published"
                );
            }
            Err(e) => {
                warn!(error = %e, "failed to publish fleet summary");
                self.counters.publish_failures = self.counters.publish_failures.saturating_add(1);
            }
        }
    }

    /// Publish the initial state, then tick until stopped.
    ///
    /// Shutdown and the run duration are both checked at tick boundaries,
    /// so a tick in progress always completes. The bus is disconnected
    /// exactly once, including when this future is dropped mid-run.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> SimulationReport {
        info!(
            transport = self.bus.bus().name(),
            tick_interval_ms = u64::try_from(self.tick_interval.as_millis()).unwrap_or(u64::MAX),
            change_probability = self.change_probability,
            duration_secs = self.duration.map(|d| d.as_secs()),
            "fleet simulation starting"
        );

        self.publish_initial_state().await;

        // A zero period would make the ticker panic.
        let period = self.tick_interval.max(Duration::from_millis(1));
        let started = Instant::now();
        let first_tick = started.checked_add(period).unwrap_or(started);
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end_reason = loop {
            tokio::select! {
                biased;
                () = shutdown::requested(&mut shutdown) => break EndReason::Interrupted,
                _ = ticker.tick() => {}
            }
            if self.duration.is_some_and(|limit| started.elapsed() >= limit) {
                break EndReason::DurationElapsed;
            }
            self.tick().await;
        };

        if let Err(e) = self.bus.disconnect().await {
            warn!(error = %e, "bus disconnect failed");
        }

        let report = SimulationReport {
            ticks: self.counters.ticks,
            changes: self.counters.changes,
            summaries_published: self.counters.summaries_published,
            publish_failures: self.counters.publish_failures,
            end_reason,
        };
        info!(
            reason = ?report.end_reason,
            ticks = report.ticks,
            changes = report.changes,
            summaries = report.summaries_published,
            publish_failures = report.publish_failures,
            "fleet simulation ended"
        );
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parking_core::{ChannelBus, ZoneConfig};
    use parking_types::{FleetSummary, SensorReading, TopicKind};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::sensor::SensorModel;

    fn config(probability: f64, duration_secs: Option<u64>) -> SimulatorConfig {
        SimulatorConfig {
            tick_interval_ms: 2000,
            change_probability: probability,
            duration_secs,
        }
    }

    fn three_places() -> ParkingFleet {
        ParkingFleet::from_sensors(vec![
            SensorModel::new("Zone_A", 1, true),
            SensorModel::new("Zone_A", 2, false),
            SensorModel::new("Zone_B", 1, false),
        ])
    }

    fn drain(rx: &mut parking_core::BusReceiver) -> Vec<parking_core::BusMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn initial_state_publishes_every_sensor_then_summary() {
        let (bus, mut rx) = ChannelBus::new();
        let mut sim = FleetSimulator::new(
            three_places(),
            MessageBus::Channel(bus),
            &config(0.1, None),
            StdRng::seed_from_u64(1),
        );
        sim.publish_initial_state().await;

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 4);
        let topics: Vec<&str> = messages.iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(
            topics,
            vec![
                "parking.Zone_A.place_1",
                "parking.Zone_A.place_2",
                "parking.Zone_B.place_1",
                "parking.summary",
            ]
        );

        let first: SensorReading =
            serde_json::from_slice(&messages.first().unwrap().payload).unwrap();
        assert_eq!(first.sensor_id, 1);
        assert_eq!(first.zone, "Zone_A");

        let summary: FleetSummary =
            serde_json::from_slice(&messages.get(3).unwrap().payload).unwrap();
        assert_eq!(summary.total_places, 3);
        assert_eq!(summary.occupied, 1);
        assert_eq!(summary.free, 2);
    }

    #[tokio::test]
    async fn quiet_tick_publishes_nothing() {
        let (bus, mut rx) = ChannelBus::new();
        let mut sim = FleetSimulator::new(
            three_places(),
            MessageBus::Channel(bus),
            &config(0.0, None),
            StdRng::seed_from_u64(2),
        );
        assert_eq!(sim.tick().await, 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn busy_tick_publishes_changes_then_one_summary() {
        let (bus, mut rx) = ChannelBus::new();
        let mut sim = FleetSimulator::new(
            three_places(),
            MessageBus::Channel(bus),
            &config(1.0, None),
            StdRng::seed_from_u64(3),
        );
        assert_eq!(sim.tick().await, 3);

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 4);
        let summaries = messages
            .iter()
            .filter(|m| TopicKind::classify(&m.topic) == TopicKind::Summary)
            .count();
        assert_eq!(summaries, 1);
        assert_eq!(messages.last().unwrap().topic, SUMMARY_TOPIC);

        // Every place flipped: one occupied became free, two free became occupied.
        let summary: FleetSummary =
            serde_json::from_slice(&messages.last().unwrap().payload).unwrap();
        assert_eq!(summary.occupied, 2);
        assert_eq!(sim.fleet().occupied_places(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failures_are_counted_not_fatal() {
        let (bus, rx) = ChannelBus::new();
        drop(rx);
        let sim = FleetSimulator::new(
            three_places(),
            MessageBus::Channel(bus),
            &config(1.0, Some(4)),
            StdRng::seed_from_u64(4),
        );
        let (_trigger, signal) = shutdown::channel();
        let report = sim.run(signal).await;
        // Initial 3 statuses + summary, then the same again on the 2 s tick.
        assert_eq!(report.ticks, 1);
        assert_eq!(report.publish_failures, 8);
        assert_eq!(report.summaries_published, 0);
        assert_eq!(report.end_reason, EndReason::DurationElapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn duration_ends_run_and_disconnects_once() {
        let (channel, mut rx) = ChannelBus::new();
        let mut rng = StdRng::seed_from_u64(5);
        let fleet = ParkingFleet::from_zones(&[ZoneConfig::new("Zone_A", 8)], &mut rng);
        let sim = FleetSimulator::new(
            fleet,
            MessageBus::Channel(channel.clone()),
            &config(0.5, Some(10)),
            rng,
        );
        let (_trigger, signal) = shutdown::channel();

        let report = sim.run(signal).await;

        // Ticks fire at 2, 4, 6 and 8 seconds; the 10 s boundary ends the run.
        assert_eq!(report.ticks, 4);
        assert_eq!(report.end_reason, EndReason::DurationElapsed);
        assert_eq!(report.publish_failures, 0);
        assert_eq!(channel.disconnect_count(), 1);
        assert!(!channel.is_connected());

        let published = drain(&mut rx);
        let expected = 8_u64
            .saturating_add(report.changes)
            .saturating_add(report.summaries_published);
        assert_eq!(u64::try_from(published.len()).unwrap(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_stops_at_tick_boundary_and_disconnects_once() {
        let (channel, _rx) = ChannelBus::new();
        let sim = FleetSimulator::new(
            three_places(),
            MessageBus::Channel(channel.clone()),
            &config(0.1, None),
            StdRng::seed_from_u64(6),
        );
        let (trigger, signal) = shutdown::channel();

        let handle = tokio::spawn(sim.run(signal));
        tokio::time::sleep(Duration::from_millis(6500)).await;
        trigger.send(true).unwrap();
        let report = handle.await.unwrap();

        assert_eq!(report.end_reason, EndReason::Interrupted);
        assert_eq!(report.ticks, 3);
        assert_eq!(channel.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_run_still_disconnects_once() {
        let (channel, _rx) = ChannelBus::new();
        let sim = FleetSimulator::new(
            three_places(),
            MessageBus::Channel(channel.clone()),
            &config(0.1, None),
            StdRng::seed_from_u64(8),
        );
        let (_trigger, signal) = shutdown::channel();

        let result = tokio::time::timeout(Duration::from_secs(5), sim.run(signal)).await;

        assert!(result.is_err());
        assert_eq!(channel.disconnect_count(), 1);
        assert!(!channel.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_before_first_tick_still_publishes_initial_state() {
        let (channel, mut rx) = ChannelBus::new();
        let sim = FleetSimulator::new(
            three_places(),
            MessageBus::Channel(channel.clone()),
            &config(1.0, None),
            StdRng::seed_from_u64(7),
        );
        let (trigger, signal) = shutdown::channel();
        trigger.send(true).unwrap();

        let report = sim.run(signal).await;

        assert_eq!(report.ticks, 0);
        assert_eq!(report.summaries_published, 1);
        assert_eq!(drain(&mut rx).len(), 4);
        assert_eq!(channel.disconnect_count(), 1);
    }
}
