//! Completion predicate for card sessions

use crate::event::fields;
use crate::session::CardSession;

/// Fields a session must hold before its record is written
///
/// Presence is what counts; a null or empty value still satisfies the check.
pub const REQUIRED_FIELDS: [&str; 8] = [
    fields::CARD_ID,
    fields::SIDE,
    fields::ANSWER,
    fields::QUESTION,
    fields::DIFFICULTY,
    fields::SIDE_CHOICE_RAW,
    fields::ROBOT,
    fields::GAZE_DECISION,
];

pub fn is_complete(session: &CardSession) -> bool {
    REQUIRED_FIELDS.iter().all(|name| session.has_field(name))
}

/// Required fields the session does not hold yet
pub fn missing_fields(session: &CardSession) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|name| !session.has_field(name))
        .collect()
}
