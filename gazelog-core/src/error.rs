//! Error types for gazelog-core

use thiserror::Error;

use crate::event::EventKind;

/// Errors raised while turning an inbound frame into something the
/// correlator can act on
#[derive(Error, Debug)]
pub enum CardError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Message is not a JSON object")]
    NotAnObject,

    #[error("{} missing cardId", .0.wire_name())]
    MissingCardId(EventKind),
}

/// Errors from record sinks
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV buffer error: {0}")]
    Buffer(String),
}
