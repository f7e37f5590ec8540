//! Per-card session state
//!
//! A [`CardSession`] is the open field bag accumulated for one card until it
//! is complete. [`SessionStore`] owns every pending session keyed by card id.
//! The store performs no locking of its own; callers hold it exclusively for
//! the whole merge-and-evaluate step of a message.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Accumulated state for one card
#[derive(Debug, Clone, PartialEq)]
pub struct CardSession {
    /// Merged message fields, last write wins
    fields: Map<String, Value>,
    /// Arrival time of the most recent reveal
    revealed_at: Option<DateTime<Utc>>,
    /// Reveal-to-drop duration in seconds; `None` until computed or when no
    /// reveal preceded the drop
    move_duration: Option<f64>,
    /// Arrival time of the most recent event for this card
    last_event_at: DateTime<Utc>,
}

impl CardSession {
    /// Create an empty session
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            fields: Map::new(),
            revealed_at: None,
            move_duration: None,
            last_event_at: created_at,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// A field's value if it is a string
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn revealed_at(&self) -> Option<DateTime<Utc>> {
        self.revealed_at
    }

    pub fn move_duration(&self) -> Option<f64> {
        self.move_duration
    }

    pub fn last_event_at(&self) -> DateTime<Utc> {
        self.last_event_at
    }

    /// Overwrite fields and bump the last-event time
    pub fn merge<I>(&mut self, fields: I, at: DateTime<Utc>)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.fields.extend(fields);
        self.last_event_at = at;
    }

    /// Set a single field
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn mark_revealed(&mut self, at: DateTime<Utc>) {
        self.revealed_at = Some(at);
    }

    pub fn set_move_duration(&mut self, duration: Option<f64>) {
        self.move_duration = duration;
    }
}

/// All pending sessions keyed by card id
///
/// Sessions are never evicted. A card that never completes stays here until
/// the process exits.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, CardSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for a card, creating an empty one if absent
    ///
    /// Returns the session and whether it already existed.
    pub fn get_or_create(&mut self, card_id: &str, at: DateTime<Utc>) -> (&mut CardSession, bool) {
        let existed = self.sessions.contains_key(card_id);
        let session = self
            .sessions
            .entry(card_id.to_string())
            .or_insert_with(|| CardSession::new(at));
        (session, existed)
    }

    /// Merge fields into a card's session, creating it if needed
    pub fn merge<I>(&mut self, card_id: &str, fields: I, at: DateTime<Utc>) -> &mut CardSession
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let (session, _) = self.get_or_create(card_id, at);
        session.merge(fields, at);
        session
    }

    pub fn get(&self, card_id: &str) -> Option<&CardSession> {
        self.sessions.get(card_id)
    }

    /// Remove a card's session, returning it
    pub fn delete(&mut self, card_id: &str) -> Option<CardSession> {
        self.sessions.remove(card_id)
    }

    pub fn contains(&self, card_id: &str) -> bool {
        self.sessions.contains_key(card_id)
    }

    /// Number of pending sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
