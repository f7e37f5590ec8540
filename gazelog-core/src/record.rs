//! Mapping a completed session onto the output columns

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::duration::{adjust_for_condition, format_duration};
use crate::event::fields;
use crate::session::CardSession;

/// Output column order
pub const CSV_HEADER: [&str; 11] = [
    "timestamp",
    "participant",
    "cardId",
    "question",
    "difficulty",
    "correct_answer",
    "correct_side",
    "participants_side_choice",
    "Robot",
    "gazeDecision",
    "move_duration",
];

/// One output row
///
/// Field order and serde names are the [`CSV_HEADER`] columns, so the row can
/// be written with `csv::Writer::serialize` and read back with `deserialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub timestamp: String,
    pub participant: String,
    #[serde(rename = "cardId")]
    pub card_id: String,
    pub question: String,
    pub difficulty: String,
    pub correct_answer: String,
    pub correct_side: String,
    pub participants_side_choice: String,
    #[serde(rename = "Robot")]
    pub robot: String,
    #[serde(rename = "gazeDecision")]
    pub gaze_decision: String,
    pub move_duration: String,
}

impl CardRecord {
    /// Build the row for a completed session
    ///
    /// The timestamp is the arrival time of the session's last event. The
    /// duration is shortened when the robot label equals `special_condition`.
    pub fn from_session(session: &CardSession, special_condition: &str) -> Self {
        let card_id = cell(session.field(fields::CARD_ID));
        let robot = session.field_str(fields::ROBOT);
        let original = session.move_duration();
        let duration = adjust_for_condition(original, robot, special_condition);

        if robot == Some(special_condition) {
            match original {
                Some(secs) => info!(
                    "Adjusting duration for {} (card {}): {:.3} -> {}",
                    special_condition,
                    card_id,
                    secs,
                    format_duration(duration)
                ),
                None => warn!(
                    "Cannot adjust duration for {} (card {}): no duration was computed",
                    special_condition, card_id
                ),
            }
        }

        Self {
            timestamp: session
                .last_event_at()
                .to_rfc3339_opts(SecondsFormat::Micros, false),
            participant: cell(session.field(fields::PARTICIPANT)),
            card_id,
            question: cell(session.field(fields::QUESTION)),
            difficulty: cell(session.field(fields::DIFFICULTY)),
            correct_answer: cell(session.field(fields::ANSWER)),
            correct_side: cell(session.field(fields::SIDE)),
            participants_side_choice: cell(session.field(fields::SIDE_CHOICE_RAW)),
            robot: cell(session.field(fields::ROBOT)),
            gaze_decision: cell(session.field(fields::GAZE_DECISION)),
            move_duration: format_duration(duration),
        }
    }
}

/// Render a field value as cell text; absent and null become empty
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
