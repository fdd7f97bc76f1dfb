//! Shared application state for the query API.

use parking_core::MessageBus;
use parking_db::EventStore;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor. The API only reads from the store; the bus handle is held
/// solely so the health endpoint can report its connection.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Event store queried by every data endpoint.
    pub store: EventStore,
    /// Bus connection of the ingestion side, if any.
    pub bus: Option<MessageBus>,
}

impl AppState {
    /// State with a store and no bus.
    pub const fn new(store: EventStore) -> Self {
        Self { store, bus: None }
    }

    /// Attach the bus whose connection `/api/health` reports.
    #[must_use]
    pub fn with_bus(mut self, bus: MessageBus) -> Self {
        self.bus = Some(bus);
        self
    }
}
