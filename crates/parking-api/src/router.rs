//! Axum router construction for the query API.
//!
//! Assembles all routes into a single [`Router`] with CORS middleware
//! enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- endpoint listing
/// - `GET /api/events` -- recent events
/// - `GET /api/stats/hourly` -- hourly averages
/// - `GET /api/stats/zones` -- zone activity
/// - `GET /api/health` -- health check
///
/// CORS allows any origin so the dashboard can be served from anywhere.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/events", get(handlers::list_events))
        .route("/api/stats/hourly", get(handlers::hourly_stats))
        .route("/api/stats/zones", get(handlers::zone_stats))
        .route("/api/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
