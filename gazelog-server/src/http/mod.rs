//! HTTP server module

mod api;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::ws::ws_handler;

pub use api::HealthResponse;

/// Create the router with the WebSocket endpoint and health check
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/api/health", get(api::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
