//! Per-user processing status with a TTL safety net.
//!
//! Two interchangeable backends behind one type, selected by config:
//!
//! - **file** — one JSON document under the state directory, guarded by
//!   an advisory lock so every process instance sharing the directory
//!   observes the same records. Every write prunes expired entries.
//! - **memory** — an in-process map for single-instance and test
//!   deployments. Expired entries are discarded lazily on read; beyond
//!   that, only `clear` and process restart reclaim memory.
//!
//! A file-backend failure degrades to the in-process map for that one
//! operation and logs a warning. `get`/`set`/`clear` never fail: a user
//! must never be blocked because the status store had a bad moment.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use wf_domain::chat::ProcessingStatus;
use wf_domain::config::{StatusBackend, StatusConfig};
use wf_domain::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stored record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredStatus {
    is_processing: bool,
    last_request_time: Option<DateTime<Utc>>,
    /// Safety net: a record a crashed worker never cleared stops
    /// counting as busy once this passes.
    expires_at: DateTime<Utc>,
}

impl StoredStatus {
    fn to_status(&self) -> ProcessingStatus {
        ProcessingStatus {
            is_processing: self.is_processing,
            last_request_time: self.last_request_time,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// StatusStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct StatusStore {
    /// `Some` = file backend; `None` = memory backend.
    file_path: Option<PathBuf>,
    /// Memory backend, and the degrade target when file I/O fails.
    local: RwLock<HashMap<String, StoredStatus>>,
    ttl: Duration,
}

impl StatusStore {
    pub fn from_config(cfg: &StatusConfig, state_path: &Path) -> Self {
        let file_path = match cfg.backend {
            StatusBackend::File => Some(state_path.join("status.json")),
            StatusBackend::Memory => None,
        };
        Self {
            file_path,
            local: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(cfg.ttl_secs as i64),
        }
    }

    /// A memory-backed store, for tests and the chat REPL.
    pub fn in_memory(ttl_secs: u64) -> Self {
        Self {
            file_path: None,
            local: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Current status for a user. Unknown and expired users read as the
    /// default "not processing" value — there is no not-found case.
    pub fn get(&self, user_id: &str) -> ProcessingStatus {
        let now = Utc::now();
        if let Some(path) = &self.file_path {
            match file_read(path) {
                Ok(map) => {
                    return map
                        .get(user_id)
                        .filter(|s| s.expires_at > now)
                        .map(StoredStatus::to_status)
                        .unwrap_or_default();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "status file read failed; using local fallback");
                }
            }
        }
        self.local_get(user_id, now)
    }

    /// Overwrite a user's status. Idempotent; stamps the TTL expiry.
    pub fn set(&self, user_id: &str, is_processing: bool, at: DateTime<Utc>) {
        let record = StoredStatus {
            is_processing,
            last_request_time: Some(at),
            expires_at: at + self.ttl,
        };
        if let Some(path) = &self.file_path {
            let user = user_id.to_owned();
            let rec = record.clone();
            match file_mutate(path, move |map| {
                map.insert(user, rec);
            }) {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "status file write failed; falling back to local store");
                }
            }
        }
        self.local.write().insert(user_id.to_owned(), record);
    }

    /// Remove a user's status. No-op when absent.
    pub fn clear(&self, user_id: &str) {
        if let Some(path) = &self.file_path {
            let user = user_id.to_owned();
            match file_mutate(path, move |map| {
                map.remove(&user);
            }) {
                Ok(()) => {
                    // Also drop any record a degraded write left behind.
                    self.local.write().remove(user_id);
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "status file clear failed; clearing local store");
                }
            }
        }
        self.local.write().remove(user_id);
    }

    fn local_get(&self, user_id: &str, now: DateTime<Utc>) -> ProcessingStatus {
        {
            let map = self.local.read();
            match map.get(user_id) {
                Some(s) if s.expires_at > now => return s.to_status(),
                None => return ProcessingStatus::default(),
                Some(_) => {} // expired — prune below
            }
        }
        self.local.write().remove(user_id);
        ProcessingStatus::default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File backend helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn file_read(path: &Path) -> Result<HashMap<String, StoredStatus>> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        // An absent file is an empty store, not a failure.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };
    file.lock_shared()?;
    let result = parse_file(&file);
    let _ = fs2::FileExt::unlock(&file);
    result
}

fn parse_file(mut file: &std::fs::File) -> Result<HashMap<String, StoredStatus>> {
    let mut data = String::new();
    file.read_to_string(&mut data)?;
    if data.trim().is_empty() {
        return Ok(HashMap::new());
    }
    match serde_json::from_str(&data) {
        Ok(map) => Ok(map),
        Err(e) => {
            tracing::warn!(error = %e, "status file is malformed; treating as empty");
            Ok(HashMap::new())
        }
    }
}

fn file_mutate(
    path: &Path,
    apply: impl FnOnce(&mut HashMap<String, StoredStatus>),
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;
    file.lock_exclusive()?;

    let result: Result<()> = (|| {
        let mut map = parse_file(&file)?;
        let now = Utc::now();
        map.retain(|_, s| s.expires_at > now);
        apply(&mut map);

        let json = serde_json::to_string_pretty(&map)?;
        file.seek(SeekFrom::Start(0))?;
        file.set_len(0)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    })();

    let _ = fs2::FileExt::unlock(&file);
    result
}
