//! Per-user admission control.
//!
//! Chat transports redeliver inbound events and impatient users repeat
//! themselves; this gate decides whether an inbound message starts new
//! work, is a duplicate to drop, or deserves a "still working" notice.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::status::StatusStore;

/// Outcome of the admission check for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No turn is running — the caller proceeds to mark busy and dispatch.
    Start,
    /// A turn is running and the suppress window has elapsed — send a
    /// personalized acknowledgement, but start nothing.
    WaitNotice,
    /// A turn is running and this message arrived inside the suppress
    /// window — treat it as a transport redelivery and do not respond.
    Suppress,
}

pub struct AdmissionController {
    status: Arc<StatusStore>,
    suppress_window: Duration,
}

impl AdmissionController {
    pub fn new(status: Arc<StatusStore>, suppress_window_secs: u64) -> Self {
        Self {
            status,
            suppress_window: Duration::seconds(suppress_window_secs as i64),
        }
    }

    /// Decide what to do with an inbound message from `user_id`.
    ///
    /// `WaitNotice` refreshes `last_request_time` as a side effect, so the
    /// next repeat inside the window is suppressed instead of producing a
    /// second notice.
    ///
    /// The check here and the busy write in the dispatcher are two store
    /// operations, not one atomic step: two near-simultaneous messages can
    /// both observe "not processing". This is a best-effort throttle by
    /// design; the status TTL bounds the damage.
    pub fn decide(&self, user_id: &str, now: DateTime<Utc>) -> Admission {
        let status = self.status.get(user_id);

        if !status.is_processing {
            return Admission::Start;
        }

        let within_window = status
            .last_request_time
            .map_or(false, |t| now - t < self.suppress_window);

        if within_window {
            tracing::debug!(user_id = %user_id, "duplicate inside suppress window; dropping");
            Admission::Suppress
        } else {
            self.status.set(user_id, true, now);
            Admission::WaitNotice
        }
    }
}
