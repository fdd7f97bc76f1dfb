//! Shared plumbing for the parking occupancy pipeline.
//!
//! Both the sensor simulator and the backend service build on this crate:
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`bus`] -- publish/subscribe over NATS or an in-process channel
//! - [`shutdown`] -- Ctrl-C and watch-channel stop signals
//! - [`telemetry`] -- `tracing` subscriber installation

pub mod bus;
pub mod config;
pub mod shutdown;
pub mod telemetry;

// Re-export primary types for convenience.
pub use bus::{BusError, BusMessage, BusReceiver, ChannelBus, MessageBus, NatsBus, ScopedBus};
pub use config::{
    ConfigError, InfrastructureConfig, IngestionConfig, LogFormat, LoggingConfig, ParkingConfig,
    SimulatorConfig, StoreBackend, ZoneConfig,
};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
