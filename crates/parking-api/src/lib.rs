//! Read-only HTTP query API over the parking event store.
//!
//! This crate provides an Axum HTTP server that exposes recent events,
//! hourly occupancy averages, per-zone activity, and a health check. It
//! never writes: the ingestion service is the only writer.
//!
//! # Modules
//!
//! - [`handlers`] -- one handler per endpoint
//! - [`responses`] -- JSON envelopes (with `TypeScript` bindings)
//! - [`router`] -- route table and middleware
//! - [`server`] -- bind, serve, graceful shutdown
//! - [`state`] -- shared handles injected into handlers

pub mod error;
pub mod handlers;
pub mod responses;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve, start_server};
pub use state::AppState;
