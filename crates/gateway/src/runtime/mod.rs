//! Core runtime — admission control, background dispatch, and the tool
//! protocol engine that ties the status store, model client, parser, and
//! tool registry into one bounded loop per turn.

pub mod admission;
pub mod dispatch;
pub mod notifier;
pub mod parser;
pub mod status;
pub mod tools;
pub mod turn;

/// Fixed user-visible message when a turn ends without a final response —
/// the iteration cap was hit or the model call failed. Diagnostics go to
/// the logs, never into this string.
pub const EXHAUSTED_APOLOGY: &str =
    "Sorry, I couldn't finish putting an answer together this time. Could you ask me again?";

/// Fixed user-visible message when turn execution itself errors out at
/// the dispatch boundary.
pub const FAILURE_APOLOGY: &str =
    "Sorry, something went wrong on my end. Please try again in a moment.";

/// Truncate to at most `max` characters, appending an ellipsis marker.
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{truncated}…")
    }
}
