//! gazelog-core - Card event correlation for the sorting experiment
//!
//! Three independently sourced events describe one card trial:
//! - `cardReveal` from the game when a card is shown
//! - `RobotsMove` from the gaze controller when the robot reacts
//! - `cardDropped` from the game when the participant sorts the card
//!
//! This crate folds them into a per-card session, derives the reveal-to-drop
//! duration and emits exactly one [`CardRecord`] per card once every required
//! field has arrived. The [`Correlator`] is a pure state machine; writing to a
//! [`RecordSink`] and relaying to peers is left to the caller.

pub mod completion;
pub mod correlator;
pub mod duration;
pub mod error;
pub mod event;
pub mod record;
pub mod session;
pub mod sink;

pub use completion::{REQUIRED_FIELDS, is_complete, missing_fields};
pub use correlator::{Ack, Correlator, CorrelatorSettings, Effect, SessionPhase, Transition};
pub use duration::{DEFAULT_SPECIAL_CONDITION, adjust_for_condition, format_duration, move_duration};
pub use error::{CardError, SinkError};
pub use event::{EventKind, InboundMessage};
pub use record::{CSV_HEADER, CardRecord};
pub use session::{CardSession, SessionStore};
pub use sink::{CsvSink, HeaderCheck, MemorySink, RecordSink};
