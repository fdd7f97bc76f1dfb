//! REST API endpoint handlers.
//!
//! Every data handler runs exactly one [`EventStore`](parking_db::EventStore)
//! query and wraps the result in a `success` envelope. Nothing here writes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Endpoint listing |
//! | `GET` | `/api/events` | Recent parking events (`?limit=N`) |
//! | `GET` | `/api/stats/hourly` | Mean occupancy per hour of day |
//! | `GET` | `/api/stats/zones` | Per-zone activity over the last day |
//! | `GET` | `/api/health` | Store and bus connectivity |

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use parking_db::default_activity_window;
use tracing::warn;

use crate::error::ApiError;
use crate::responses::{
    EventView, EventsResponse, HealthResponse, HourlyStatsResponse, IndexResponse, ZonesResponse,
};
use crate::state::AppState;

/// Events returned when `limit` is absent or unusable.
pub const DEFAULT_EVENT_LIMIT: u32 = 50;

/// Upper bound on `limit`.
pub const MAX_EVENT_LIMIT: u32 = 1000;

/// Query parameters for the `GET /api/events` endpoint.
///
/// `limit` is taken as a raw string so an unparseable value falls back to
/// the default instead of rejecting the request.
#[derive(Debug, Default, serde::Deserialize)]
pub struct EventsQuery {
    /// Maximum number of events to return.
    pub limit: Option<String>,
}

/// Resolve the effective event limit.
///
/// Absent, negative, or non-numeric values give [`DEFAULT_EVENT_LIMIT`];
/// anything above [`MAX_EVENT_LIMIT`] is capped.
pub fn effective_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .min(MAX_EVENT_LIMIT)
}

/// `GET /` -- list the available endpoints.
pub async fn index() -> Json<IndexResponse> {
    let endpoints: BTreeMap<String, String> = [
        ("/api/events", "Recent parking events"),
        ("/api/stats/hourly", "Hourly statistics"),
        ("/api/stats/zones", "Statistics by zone"),
        ("/api/health", "Health check"),
    ]
    .into_iter()
    .map(|(path, description)| (path.to_owned(), description.to_owned()))
    .collect();

    Json(IndexResponse {
        success: true,
        message: String::from("Parking IoT Backend API"),
        version: String::from(env!("CARGO_PKG_VERSION")),
        endpoints,
    })
}

/// `GET /api/events` -- most recent events, newest first.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let limit = effective_limit(params.limit.as_deref());
    let events: Vec<EventView> = state
        .store
        .recent_events(limit)
        .await?
        .into_iter()
        .map(EventView::from)
        .collect();

    Ok(Json(EventsResponse {
        success: true,
        count: events.len(),
        events,
    }))
}

/// `GET /api/stats/hourly` -- mean occupancy per hour of day.
pub async fn hourly_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HourlyStatsResponse>, ApiError> {
    let statistics = state.store.hourly_averages().await?;
    Ok(Json(HourlyStatsResponse {
        success: true,
        statistics,
    }))
}

/// `GET /api/stats/zones` -- per-zone activity over the trailing day.
pub async fn zone_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ZonesResponse>, ApiError> {
    let zones = state.store.zone_activity(default_activity_window()).await?;
    Ok(Json(ZonesResponse {
        success: true,
        zones,
    }))
}

/// `GET /api/health` -- live store and bus status.
///
/// Always answers `200`; a failing dependency shows up as `degraded`.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "health check: store unreachable");
            false
        }
    };
    let bus = state.bus.as_ref().is_some_and(parking_core::MessageBus::is_connected);

    Json(HealthResponse::from_checks(database, bus, Utc::now()))
}
