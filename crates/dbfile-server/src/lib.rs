//! Storage status and admin sync endpoints.
//!
//! The router is a library function so a host application can merge it into
//! its own; the `dbfile-server` binary serves it standalone.

pub mod auth;
pub mod backends;
pub mod config;
pub mod error;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// Build the storage router over the given state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/storage/status", get(handlers::status_handler))
        .route("/api/storage/sync", post(handlers::sync_handler))
        .route("/api/storage/refetch", post(handlers::refetch_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
