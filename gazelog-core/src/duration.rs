//! Reveal-to-drop duration and the robot-condition adjustment

use chrono::{DateTime, Utc};

/// Robot label whose durations are shortened by [`CONDITION_OFFSET_SECS`]
pub const DEFAULT_SPECIAL_CONDITION: &str = "Carl condition";

/// Seconds subtracted from the duration under the special condition
pub const CONDITION_OFFSET_SECS: f64 = 2.0;

/// Seconds between reveal and drop, or `None` if the card was never revealed
pub fn move_duration(revealed_at: Option<DateTime<Utc>>, dropped_at: DateTime<Utc>) -> Option<f64> {
    let elapsed = dropped_at - revealed_at?;
    let micros = elapsed
        .num_microseconds()
        .unwrap_or_else(|| elapsed.num_milliseconds().saturating_mul(1_000));
    Some(micros as f64 / 1_000_000.0)
}

/// Apply the special-condition offset
///
/// Only a computed duration under exactly the special label is adjusted. The
/// result is not clamped and may be negative.
pub fn adjust_for_condition(
    duration: Option<f64>,
    robot: Option<&str>,
    special_condition: &str,
) -> Option<f64> {
    match (duration, robot) {
        (Some(secs), Some(label)) if label == special_condition && secs.is_finite() => {
            Some(secs - CONDITION_OFFSET_SECS)
        }
        _ => duration,
    }
}

/// Render a duration as three-decimal text, empty when absent
pub fn format_duration(duration: Option<f64>) -> String {
    match duration {
        Some(secs) if secs.is_finite() => format!("{:.3}", secs),
        _ => String::new(),
    }
}
