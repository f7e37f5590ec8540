//! Per-card state machine
//!
//! [`Correlator::handle`] folds one inbound message into the session store
//! and returns a [`Transition`] describing what the caller must do next:
//! write a finished record, relay the raw message, acknowledge the sender.
//! It performs no I/O, so the merge, the completion check and the removal of
//! a finished session happen as one step while the caller holds the
//! correlator exclusively.
//!
//! ```text
//! Empty --merge--> PartiallyFilled --merge--> PartiallyFilled
//!                        |
//!                        +--merge, all required fields--> Complete (removed, written)
//! ```

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::completion::{is_complete, missing_fields};
use crate::duration::{DEFAULT_SPECIAL_CONDITION, move_duration};
use crate::error::CardError;
use crate::event::{EventKind, InboundMessage, fields};
use crate::record::CardRecord;
use crate::session::SessionStore;

/// Settings that shape how records are produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatorSettings {
    /// Robot label whose durations are shortened by two seconds
    pub special_condition: String,
}

impl Default for CorrelatorSettings {
    fn default() -> Self {
        Self {
            special_condition: DEFAULT_SPECIAL_CONDITION.to_string(),
        }
    }
}

/// State of a card's session after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session exists for the card
    Empty,
    /// Some fields have arrived, more are required
    PartiallyFilled,
    /// Every required field arrived; the session was removed and written
    Complete,
}

/// Acknowledgement sent back to the message's sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// The event was merged and the card still waits for other events
    Waiting(EventKind),
    /// The event completed the card and its record was logged
    Logged,
    /// A reveal was merged and relayed
    RevealProcessed,
    /// The message was rejected
    Error(String),
}

impl Ack {
    pub fn status(&self) -> String {
        match self {
            Ack::Waiting(kind) => {
                format!("{} stored; waiting for additional info", kind.wire_name())
            }
            Ack::Logged => "combined record logged".to_string(),
            Ack::RevealProcessed => "cardReveal processed, stored, and forwarded".to_string(),
            Ack::Error(_) => "error".to_string(),
        }
    }
}

#[derive(Serialize)]
struct AckBody<'a> {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

impl Serialize for Ack {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let message = match self {
            Ack::Error(message) => Some(message.as_str()),
            _ => None,
        };
        AckBody {
            status: self.status(),
            message,
        }
        .serialize(serializer)
    }
}

/// Side effect the caller performs after a transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append this record to the sink
    Write(CardRecord),
    /// Relay the raw message to every other peer
    Forward,
    /// Reply to the sender
    Acknowledge(Ack),
}

/// Result of handling one message
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub kind: EventKind,
    pub card_id: Option<String>,
    /// Phase of the card's session afterwards; `None` when no session was
    /// touched
    pub phase: Option<SessionPhase>,
    pub effects: Vec<Effect>,
}

impl Transition {
    /// The record to write, if the card completed
    pub fn record(&self) -> Option<&CardRecord> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::Write(record) => Some(record),
            _ => None,
        })
    }

    pub fn forwards(&self) -> bool {
        self.effects.contains(&Effect::Forward)
    }

    pub fn ack(&self) -> Option<&Ack> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::Acknowledge(ack) => Some(ack),
            _ => None,
        })
    }
}

/// Owner of all pending card sessions
#[derive(Debug, Default)]
pub struct Correlator {
    store: SessionStore,
    settings: CorrelatorSettings,
}

impl Correlator {
    pub fn new(settings: CorrelatorSettings) -> Self {
        Self {
            store: SessionStore::new(),
            settings,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Number of cards waiting for more events
    pub fn pending(&self) -> usize {
        self.store.len()
    }

    /// Current phase of a card's session
    pub fn phase_of(&self, card_id: &str) -> SessionPhase {
        if self.store.contains(card_id) {
            SessionPhase::PartiallyFilled
        } else {
            SessionPhase::Empty
        }
    }

    /// Apply one message
    pub fn handle(&mut self, message: &InboundMessage) -> Transition {
        let kind = message.kind();
        let card_id = message.card_id();

        if !kind.is_recognized() {
            debug!(
                "Relaying unrecognized event {:?}",
                message.event_name().unwrap_or("<none>")
            );
            return Transition {
                kind,
                card_id,
                phase: None,
                effects: vec![Effect::Forward],
            };
        }

        let Some(card_id) = card_id else {
            let error = CardError::MissingCardId(kind);
            warn!("{}", error);
            return Transition {
                kind,
                card_id: None,
                phase: None,
                effects: vec![Effect::Acknowledge(Ack::Error(error.to_string()))],
            };
        };

        let complete = self.merge(kind, &card_id, message);

        let mut effects = Vec::with_capacity(3);
        let phase = if complete {
            if let Some(session) = self.store.delete(&card_id) {
                info!("Record complete for cardId {}", card_id);
                effects.push(Effect::Write(CardRecord::from_session(
                    &session,
                    &self.settings.special_condition,
                )));
            }
            SessionPhase::Complete
        } else {
            SessionPhase::PartiallyFilled
        };

        match kind {
            EventKind::Reveal => {
                effects.push(Effect::Forward);
                effects.push(Effect::Acknowledge(Ack::RevealProcessed));
            }
            _ if complete => effects.push(Effect::Acknowledge(Ack::Logged)),
            _ => effects.push(Effect::Acknowledge(Ack::Waiting(kind))),
        }

        Transition {
            kind,
            card_id: Some(card_id),
            phase: Some(phase),
            effects,
        }
    }

    /// Fold a recognized event into its card's session, returning whether the
    /// session is now complete
    fn merge(&mut self, kind: EventKind, card_id: &str, message: &InboundMessage) -> bool {
        let at = message.arrived_at();
        let (session, existed) = self.store.get_or_create(card_id, at);

        if !existed && kind != EventKind::Reveal {
            warn!(
                "{} received for unknown cardId {}; storing partial data",
                kind.wire_name(),
                card_id
            );
        }

        session.merge(message.fields().clone(), at);

        match kind {
            EventKind::Reveal => {
                session.mark_revealed(at);
                for name in [fields::SIDE, fields::ANSWER] {
                    session.set_field(name, message.field(name).cloned().unwrap_or(Value::Null));
                }
                debug!("Stored reveal time for cardId {}: {}", card_id, at.to_rfc3339());
            }
            EventKind::Dropped => {
                session.set_field(
                    fields::SIDE_CHOICE_RAW,
                    message
                        .field(fields::SIDE_CHOICE)
                        .cloned()
                        .unwrap_or(Value::Null),
                );
                let duration = move_duration(session.revealed_at(), at);
                match duration {
                    Some(secs) => debug!("Calculated duration for cardId {}: {:.3}s", card_id, secs),
                    None => warn!(
                        "cardDropped received for cardId {} without a prior reveal",
                        card_id
                    ),
                }
                session.set_move_duration(duration);
            }
            EventKind::RobotMove | EventKind::Other => {}
        }

        let complete = is_complete(session);
        if !complete {
            debug!(
                "cardId {} waiting for {:?}",
                card_id,
                missing_fields(session)
            );
        }
        complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;

    fn message(value: Value, at: DateTime<Utc>) -> InboundMessage {
        InboundMessage::parse(value.to_string(), at).unwrap()
    }

    fn reveal(card_id: &str, at: DateTime<Utc>) -> InboundMessage {
        message(
            json!({
                "event": "cardReveal",
                "cardId": card_id,
                "participant": "P07",
                "side": "left",
                "answer": "left",
                "question": "Q1",
                "difficulty": "easy"
            }),
            at,
        )
    }

    fn robot(card_id: &str, condition: &str, at: DateTime<Utc>) -> InboundMessage {
        message(
            json!({
                "event": "RobotsMove",
                "cardId": card_id,
                "Robot": condition,
                "gazeDecision": "left"
            }),
            at,
        )
    }

    fn dropped(card_id: &str, at: DateTime<Utc>) -> InboundMessage {
        message(
            json!({"event": "cardDropped", "cardId": card_id, "side_choice": "left"}),
            at,
        )
    }

    #[test]
    fn carl_condition_example_writes_adjusted_duration() {
        let mut correlator = Correlator::default();
        let t0 = Utc::now();

        let first = correlator.handle(&robot("C1", "Carl condition", t0 - Duration::seconds(1)));
        assert_eq!(first.ack(), Some(&Ack::Waiting(EventKind::RobotMove)));
        assert_eq!(first.phase, Some(SessionPhase::PartiallyFilled));

        let second = correlator.handle(&reveal("C1", t0));
        assert!(second.record().is_none());
        assert!(second.forwards());

        let third = correlator.handle(&dropped("C1", t0 + Duration::milliseconds(5_200)));
        assert_eq!(third.phase, Some(SessionPhase::Complete));
        assert_eq!(third.ack(), Some(&Ack::Logged));
        assert!(!third.forwards());

        let record = third.record().unwrap();
        assert_eq!(record.move_duration, "3.200");
        assert_eq!(record.correct_side, "left");
        assert_eq!(record.participants_side_choice, "left");
        assert_eq!(record.robot, "Carl condition");
        assert_eq!(correlator.pending(), 0);
    }

    #[test]
    fn reveal_is_forwarded_then_acknowledged() {
        let mut correlator = Correlator::default();
        let transition = correlator.handle(&reveal("C1", Utc::now()));
        assert_eq!(
            transition.effects,
            vec![
                Effect::Forward,
                Effect::Acknowledge(Ack::RevealProcessed)
            ]
        );
    }

    #[test]
    fn reveal_completing_a_card_writes_before_forwarding() {
        let mut correlator = Correlator::default();
        let t0 = Utc::now();
        correlator.handle(&robot("C1", "Baseline", t0));
        correlator.handle(&dropped("C1", t0 + Duration::seconds(1)));

        let transition = correlator.handle(&reveal("C1", t0 + Duration::seconds(2)));
        assert!(matches!(transition.effects[0], Effect::Write(_)));
        assert_eq!(transition.effects[1], Effect::Forward);
        assert_eq!(transition.ack(), Some(&Ack::RevealProcessed));
        assert_eq!(transition.record().unwrap().move_duration, "");
    }

    #[test]
    fn drop_before_reveal_skips_adjustment() {
        let mut correlator = Correlator::default();
        let t0 = Utc::now();
        correlator.handle(&dropped("C1", t0));
        correlator.handle(&robot("C1", "Carl condition", t0 + Duration::seconds(1)));
        let transition = correlator.handle(&reveal("C1", t0 + Duration::seconds(2)));

        let record = transition.record().unwrap();
        assert_eq!(record.move_duration, "");
        assert_eq!(record.robot, "Carl condition");
    }

    #[test]
    fn missing_card_id_is_rejected_without_merge() {
        let mut correlator = Correlator::default();
        let transition = correlator.handle(&message(
            json!({"event": "cardDropped", "side_choice": "left"}),
            Utc::now(),
        ));

        assert_eq!(
            transition.effects,
            vec![Effect::Acknowledge(Ack::Error(
                "cardDropped missing cardId".to_string()
            ))]
        );
        assert_eq!(transition.phase, None);
        assert_eq!(correlator.pending(), 0);
    }

    #[test]
    fn reveal_without_card_id_is_not_forwarded() {
        let mut correlator = Correlator::default();
        let transition = correlator.handle(&message(
            json!({"event": "cardReveal", "side": "left"}),
            Utc::now(),
        ));
        assert!(!transition.forwards());
        assert!(matches!(transition.ack(), Some(Ack::Error(_))));
    }

    #[test]
    fn other_events_are_forwarded_and_leave_store_alone() {
        let mut correlator = Correlator::default();
        let transition = correlator.handle(&message(
            json!({"event": "startRound", "cardId": "C1", "round": 2}),
            Utc::now(),
        ));

        assert_eq!(transition.effects, vec![Effect::Forward]);
        assert_eq!(transition.phase, None);
        assert_eq!(correlator.phase_of("C1"), SessionPhase::Empty);
    }

    #[test]
    fn completed_card_starts_fresh_on_next_event() {
        let mut correlator = Correlator::default();
        let t0 = Utc::now();
        correlator.handle(&reveal("C1", t0));
        correlator.handle(&robot("C1", "Baseline", t0));
        let done = correlator.handle(&dropped("C1", t0 + Duration::seconds(1)));
        assert!(done.record().is_some());

        let again = correlator.handle(&dropped("C1", t0 + Duration::seconds(2)));
        assert!(again.record().is_none());
        assert_eq!(again.ack(), Some(&Ack::Waiting(EventKind::Dropped)));

        let session = correlator.store().get("C1").unwrap();
        assert!(!session.has_field("question"));
        assert!(session.revealed_at().is_none());
        assert!(session.move_duration().is_none());
    }

    #[test]
    fn reveal_always_sets_side_and_answer() {
        let mut correlator = Correlator::default();
        correlator.handle(&message(
            json!({"event": "cardReveal", "cardId": "C1"}),
            Utc::now(),
        ));

        let session = correlator.store().get("C1").unwrap();
        assert_eq!(session.field("side"), Some(&Value::Null));
        assert_eq!(session.field("answer"), Some(&Value::Null));
    }

    #[test]
    fn later_fields_overwrite_earlier_ones() {
        let mut correlator = Correlator::default();
        let t0 = Utc::now();
        correlator.handle(&robot("C1", "Baseline", t0));
        correlator.handle(&robot("C1", "Carl condition", t0 + Duration::seconds(1)));

        let session = correlator.store().get("C1").unwrap();
        assert_eq!(session.field_str("Robot"), Some("Carl condition"));
        assert_eq!(session.last_event_at(), t0 + Duration::seconds(1));
    }

    #[test]
    fn record_timestamp_is_last_event_arrival() {
        let mut correlator = Correlator::default();
        let t0 = Utc::now();
        let last = t0 + Duration::seconds(4);
        correlator.handle(&reveal("C1", t0));
        correlator.handle(&robot("C1", "Baseline", t0 + Duration::seconds(1)));
        let transition = correlator.handle(&dropped("C1", last));

        assert_eq!(
            transition.record().unwrap().timestamp,
            last.to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
        );
    }

    #[test]
    fn custom_special_condition_is_honoured() {
        let mut correlator = Correlator::new(CorrelatorSettings {
            special_condition: "Robot B".to_string(),
        });
        let t0 = Utc::now();
        correlator.handle(&reveal("C1", t0));
        correlator.handle(&robot("C1", "Robot B", t0));
        let transition = correlator.handle(&dropped("C1", t0 + Duration::milliseconds(2_500)));
        assert_eq!(transition.record().unwrap().move_duration, "0.500");
    }

    #[test]
    fn ack_serializes_to_status_objects() {
        assert_eq!(
            serde_json::to_value(Ack::Waiting(EventKind::RobotMove)).unwrap(),
            json!({"status": "RobotsMove stored; waiting for additional info"})
        );
        assert_eq!(
            serde_json::to_value(Ack::Logged).unwrap(),
            json!({"status": "combined record logged"})
        );
        assert_eq!(
            serde_json::to_value(Ack::RevealProcessed).unwrap(),
            json!({"status": "cardReveal processed, stored, and forwarded"})
        );
        assert_eq!(
            serde_json::to_value(Ack::Error("cardReveal missing cardId".to_string())).unwrap(),
            json!({"status": "error", "message": "cardReveal missing cardId"})
        );
    }
}
