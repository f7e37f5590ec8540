//! REST API handlers

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Cards with a session still waiting for events
    pub pending_cards: usize,
    /// Connected WebSocket peers
    pub connected_peers: usize,
}

/// Health check endpoint
///
/// Pending cards are never evicted, so a steadily growing count points at
/// trials whose events never all arrived.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        pending_cards: state.pending_cards().await,
        connected_peers: state.peers.count().await,
    })
}
