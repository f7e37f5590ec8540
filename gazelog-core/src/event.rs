//! Inbound message parsing and event classification

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::CardError;

/// Field names used on the wire and inside a session
pub mod fields {
    pub const EVENT: &str = "event";
    pub const CARD_ID: &str = "cardId";
    pub const PARTICIPANT: &str = "participant";
    pub const QUESTION: &str = "question";
    pub const DIFFICULTY: &str = "difficulty";
    pub const SIDE: &str = "side";
    pub const ANSWER: &str = "answer";
    pub const SIDE_CHOICE: &str = "side_choice";
    /// Internal name the dropped side choice is stored under
    pub const SIDE_CHOICE_RAW: &str = "side_choice_raw";
    pub const ROBOT: &str = "Robot";
    pub const GAZE_DECISION: &str = "gazeDecision";
}

/// Kind of an inbound event, decided by its `event` discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A card was shown to the participant (`cardReveal`)
    Reveal,
    /// The participant sorted the card (`cardDropped`)
    Dropped,
    /// The robot reacted to the reveal (`RobotsMove`)
    RobotMove,
    /// Anything else, including a missing discriminator
    Other,
}

impl EventKind {
    /// Classify an `event` discriminator value
    pub fn from_wire(name: Option<&str>) -> Self {
        match name {
            Some("cardReveal") => EventKind::Reveal,
            Some("cardDropped") => EventKind::Dropped,
            Some("RobotsMove") => EventKind::RobotMove,
            _ => EventKind::Other,
        }
    }

    /// The discriminator value this kind is sent with
    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::Reveal => "cardReveal",
            EventKind::Dropped => "cardDropped",
            EventKind::RobotMove => "RobotsMove",
            EventKind::Other => "unknown",
        }
    }

    /// Whether the correlator folds this kind into a card session
    pub fn is_recognized(self) -> bool {
        !matches!(self, EventKind::Other)
    }
}

/// A parsed text frame together with its arrival time
///
/// The raw text is kept so relayed messages go out byte-for-byte as they
/// came in.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    raw: String,
    payload: Map<String, Value>,
    kind: EventKind,
    arrived_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Parse and classify a text frame
    ///
    /// Fails when the frame is not JSON or is JSON but not an object. An
    /// absent or non-string `event` field classifies as [`EventKind::Other`].
    pub fn parse(raw: impl Into<String>, arrived_at: DateTime<Utc>) -> Result<Self, CardError> {
        let raw = raw.into();
        let payload = match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => map,
            _ => return Err(CardError::NotAnObject),
        };
        let kind = EventKind::from_wire(payload.get(fields::EVENT).and_then(Value::as_str));

        Ok(Self {
            raw,
            payload,
            kind,
            arrived_at,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn arrived_at(&self) -> DateTime<Utc> {
        self.arrived_at
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// The declared `event` value, if it is a string
    pub fn event_name(&self) -> Option<&str> {
        self.payload.get(fields::EVENT).and_then(Value::as_str)
    }

    /// The correlation key
    ///
    /// Null, empty strings and non-scalar values count as absent. Numeric
    /// ids are accepted and keyed by their decimal text.
    pub fn card_id(&self) -> Option<String> {
        match self.payload.get(fields::CARD_ID)? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Look up a single field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}
