//! Server error types

use gazelog_core::SinkError;
use thiserror::Error;

/// Errors that can occur in the gazelog server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection's own outbound queue is gone
    #[error("peer {0} is no longer connected")]
    PeerClosed(String),

    /// Failed to encode an outbound message
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record sink could not be prepared
    #[error("record sink error: {0}")]
    Sink(#[from] SinkError),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
