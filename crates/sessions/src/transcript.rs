//! Append-only JSONL transcripts.
//!
//! Each user gets a `<user>.jsonl` file under the transcripts directory.
//! Every exchanged message is appended as a single JSON line, once per
//! message, independent of whether the turn that produced it succeeded.
//!
//! Includes an in-memory write-through cache so history reads never hit
//! disk after the first load.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use wf_domain::Result;

/// A single transcript line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub at: DateTime<Utc>,
    pub role: String,
    pub text: String,
}

/// Writes append-only JSONL transcript files with an in-memory
/// write-through cache.
///
/// Append failures are logged, never raised: transcript persistence is a
/// best-effort collaborator and must not affect turn processing.
pub struct TranscriptLog {
    base_dir: PathBuf,
    cache: RwLock<HashMap<String, Vec<TranscriptLine>>>,
}

impl TranscriptLog {
    pub fn new(state_path: &Path) -> Self {
        Self {
            base_dir: state_path.join("transcripts"),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Append one line to a user's transcript.
    pub fn append(&self, user_id: &str, role: &str, text: &str) {
        let line = TranscriptLine {
            at: Utc::now(),
            role: role.to_owned(),
            text: text.to_owned(),
        };

        if let Err(e) = self.write_to_disk(user_id, &line) {
            tracing::warn!(user_id = %user_id, error = %e, "transcript append failed");
            return;
        }

        let mut cache = self.cache.write();
        cache.entry(user_id.to_owned()).or_default().push(line);
    }

    /// The most recent `limit` lines for a user, oldest first.
    pub fn history(&self, user_id: &str, limit: usize) -> Vec<TranscriptLine> {
        {
            let cache = self.cache.read();
            if let Some(lines) = cache.get(user_id) {
                return tail(lines, limit);
            }
        }

        let lines = self.read_from_disk(user_id);
        let out = tail(&lines, limit);
        self.cache.write().insert(user_id.to_owned(), lines);
        out
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        // User IDs come from external transports; keep the file name safe.
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{safe}.jsonl"))
    }

    fn write_to_disk(&self, user_id: &str, line: &TranscriptLine) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        let json = serde_json::to_string(line)?;
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(user_id))?;
        writeln!(f, "{json}")?;
        Ok(())
    }

    fn read_from_disk(&self, user_id: &str) -> Vec<TranscriptLine> {
        let Ok(data) = std::fs::read_to_string(self.path_for(user_id)) else {
            return Vec::new();
        };
        data.lines()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }
}

fn tail(lines: &[TranscriptLine], limit: usize) -> Vec<TranscriptLine> {
    let start = lines.len().saturating_sub(limit);
    lines[start..].to_vec()
}
