//! Shared application state for the gazelog server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gazelog_core::{CardRecord, Correlator, CorrelatorSettings, MemorySink, RecordSink};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::ws::PeerRegistry;

/// Shared application state accessible by all handlers
pub struct AppState {
    /// Pending card sessions; hold the lock for a whole message
    pub correlator: Mutex<Correlator>,
    /// Connected peers for acknowledgements and relaying
    pub peers: PeerRegistry,
    /// Where completed records are written
    pub sink: Arc<dyn RecordSink>,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state writing to the given sink
    pub fn new(sink: Arc<dyn RecordSink>, settings: CorrelatorSettings) -> Self {
        Self {
            correlator: Mutex::new(Correlator::new(settings)),
            peers: PeerRegistry::new(),
            sink,
            started_at: Utc::now(),
        }
    }

    /// Create state backed by an in-memory sink (for testing)
    pub fn new_for_testing() -> (Self, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let state = Self::new(sink.clone(), CorrelatorSettings::default());
        (state, sink)
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// Number of cards still waiting for events
    pub async fn pending_cards(&self) -> usize {
        self.correlator.lock().await.pending()
    }

    /// Append a completed record
    ///
    /// Failures are logged and not retried; the card is treated as processed
    /// either way.
    pub async fn write_record(&self, record: &CardRecord) -> bool {
        match self.sink.append(record).await {
            Ok(()) => {
                info!("Logged combined record for cardId {}", record.card_id);
                true
            }
            Err(e) => {
                error!(
                    "Failed to write record for cardId {}: {}",
                    record.card_id, e
                );
                false
            }
        }
    }
}
