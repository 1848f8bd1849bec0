use std::sync::Arc;

use wf_domain::config::Config;
use wf_sessions::{TranscriptLog, UserProfiles};

use crate::outbound::MessageSender;
use crate::runtime::admission::AdmissionController;
use crate::runtime::dispatch::BackgroundDispatcher;
use crate::runtime::status::StatusStore;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── Admission & dispatch ──────────────────────────────────────
    pub status: Arc<StatusStore>,
    pub admission: Arc<AdmissionController>,
    pub dispatcher: Arc<BackgroundDispatcher>,

    // ── Collaborators ─────────────────────────────────────────────
    pub sender: Arc<dyn MessageSender>,
    pub profiles: Arc<UserProfiles>,
    pub transcripts: Arc<TranscriptLog>,
}
