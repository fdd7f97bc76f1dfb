//! Error types for the sensor simulator.

/// Top-level error for the simulator binary.
///
/// Only startup can fail: once the loop runs, publish failures are logged
/// and counted instead of propagated.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: parking_core::ConfigError,
    },

    /// The message bus could not be reached.
    #[error("bus error: {source}")]
    Bus {
        /// The underlying bus error.
        #[from]
        source: parking_core::BusError,
    },
}
