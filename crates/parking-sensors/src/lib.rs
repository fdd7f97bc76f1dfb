//! Simulated parking sensor fleet.
//!
//! - [`sensor`] -- one place and its occupancy sensor
//! - [`fleet`] -- every sensor of the lot and the fleet summary
//! - [`simulator`] -- the tick loop publishing changes on the bus

pub mod error;
pub mod fleet;
pub mod sensor;
pub mod simulator;

pub use error::SimulatorError;
pub use fleet::ParkingFleet;
pub use sensor::SensorModel;
pub use simulator::{EndReason, FleetSimulator, SimulationReport};
