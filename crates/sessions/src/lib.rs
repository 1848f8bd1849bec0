//! Persistence collaborators: per-user conversation transcripts and the
//! user-profile registry used for personalization.

pub mod profile;
pub mod transcript;

pub use profile::UserProfiles;
pub use transcript::{TranscriptLine, TranscriptLog};
