//! Error types for the backend binary.
//!
//! [`BackendError`] wraps every failure that can abort startup or the
//! API server.

/// Top-level error for the backend binary.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: parking_core::ConfigError,
    },

    /// The event store could not be opened or migrated.
    #[error("database error: {source}")]
    Db {
        /// The underlying database error.
        #[from]
        source: parking_db::DbError,
    },

    /// The message bus could not be reached or subscribed.
    #[error("bus error: {source}")]
    Bus {
        /// The underlying bus error.
        #[from]
        source: parking_core::BusError,
    },

    /// The query API failed to bind or serve.
    #[error("api error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: parking_api::ServerError,
    },
}
