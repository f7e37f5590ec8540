//! gazelog-server - WebSocket server for the card sorting experiment
//!
//! The game and the gaze controller connect as WebSocket clients and send
//! card events. This crate feeds them through the shared [`Correlator`],
//! writes finished records to the CSV sink and relays reveals (and any
//! unrecognized events) to the other connected clients.
//!
//! [`Correlator`]: gazelog_core::Correlator

mod error;
pub mod http;
mod state;
pub mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use gazelog_core::{
    CorrelatorSettings, CsvSink, DEFAULT_SPECIAL_CONDITION, HeaderCheck, RecordSink,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use error::ServerError;
pub use http::create_router;
pub use state::AppState;

/// Default port for the gazelog server
pub const DEFAULT_PORT: u16 = 8765;
/// Default host for the gazelog server
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default CSV file completed records are appended to
pub const DEFAULT_CSV_PATH: &str = "gaze_log.csv";

/// The gazelog server
pub struct GazelogServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl GazelogServer {
    /// Create a server writing to the configured CSV file
    ///
    /// The file gets its header if it is new or empty; an existing file's
    /// header is checked and any mismatch is logged.
    pub async fn with_csv_sink(config: ServerConfig) -> Result<Self, ServerError> {
        let sink = CsvSink::new(&config.csv_path);
        report_header_check(&sink, sink.initialize().await?);

        let sink: Arc<dyn RecordSink> = Arc::new(sink);
        let state = Arc::new(AppState::new(sink, config.correlator_settings()));

        Ok(Self { config, state })
    }

    /// Create a server with custom state (for testing)
    pub fn with_state(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        info!("gazelog server listening on ws://{}", addr);

        self.run_with_listener(listener).await
    }

    /// Run the server on an already bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let state = Arc::clone(&self.state);
        let router = create_router(self.state);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

        let pending = state.pending_cards().await;
        if pending > 0 {
            warn!("Shutting down with {} incomplete card sessions", pending);
        }

        Ok(())
    }
}

fn report_header_check(sink: &CsvSink, check: HeaderCheck) {
    let path = sink.path().display();
    match check {
        HeaderCheck::Created => info!("CSV file {} created with headers", path),
        HeaderCheck::Matches => info!("CSV file {} already exists with correct headers", path),
        HeaderCheck::MissingDuration(_) => warn!(
            "CSV file {} exists but is missing the 'move_duration' column; new rows will have it",
            path
        ),
        HeaderCheck::LegacyColumns(found) => warn!(
            "CSV file {} uses old column names ({:?}); new rows use the renamed columns",
            path, found
        ),
        HeaderCheck::Mismatch(found) => warn!(
            "CSV file {} header mismatch, found {:?}; consider backing up the file",
            path, found
        ),
        HeaderCheck::Unreadable(reason) => warn!(
            "Could not read existing CSV header of {}: {}; appending anyway",
            path, reason
        ),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// CSV file completed records are appended to
    pub csv_path: PathBuf,
    /// Robot label whose durations are shortened by two seconds
    pub special_condition: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            special_condition: DEFAULT_SPECIAL_CONDITION.to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:8765")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn correlator_settings(&self) -> CorrelatorSettings {
        CorrelatorSettings {
            special_condition: self.special_condition.clone(),
        }
    }
}
