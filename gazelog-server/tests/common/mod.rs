//! Shared test utilities for gazelog-server integration tests

pub mod client;

use std::net::SocketAddr;
use std::sync::Arc;

use gazelog_core::{CorrelatorSettings, MemorySink};
use gazelog_server::{AppState, GazelogServer, ServerConfig};
use tokio::net::TcpListener;

/// Creates a test server backed by an in-memory sink
#[allow(dead_code)]
pub async fn create_test_server() -> (Arc<AppState>, Arc<MemorySink>, SocketAddr) {
    let (state, sink) = AppState::new_for_testing();
    let state = Arc::new(state);
    let addr = spawn_server(GazelogServer::with_state(
        ServerConfig::default(),
        Arc::clone(&state),
    ))
    .await;

    (state, sink, addr)
}

/// Creates a test server whose every record write fails
#[allow(dead_code)]
pub async fn create_failing_sink_server() -> (Arc<AppState>, SocketAddr) {
    let state = Arc::new(AppState::new(
        Arc::new(MemorySink::failing()),
        CorrelatorSettings::default(),
    ));
    let addr = spawn_server(GazelogServer::with_state(
        ServerConfig::default(),
        Arc::clone(&state),
    ))
    .await;

    (state, addr)
}

/// Spawns server in background task, returns bound address
async fn spawn_server(server: GazelogServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    addr
}

/// Wait until the server has registered `expected` peers
#[allow(dead_code)]
pub async fn wait_for_peers(state: &AppState, expected: usize) {
    for _ in 0..200 {
        if state.peers.count().await == expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!(
        "expected {} peers, have {}",
        expected,
        state.peers.count().await
    );
}
