//! User profiles — the name lookup behind personalized notices.
//!
//! Profiles live in a single `profiles.json` document under the state
//! directory, keyed by user id. The onboarding flow that fills this file
//! is an external collaborator; this side only reads.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub first_name: Option<String>,
}

/// Read-only registry of user profiles, loaded once at startup.
pub struct UserProfiles {
    map: HashMap<String, Profile>,
}

impl UserProfiles {
    /// Load `profiles.json` from the state directory. A missing or
    /// unreadable file yields an empty registry — personalization is
    /// optional everywhere it is used.
    pub fn load(state_path: &Path) -> Self {
        let path = state_path.join("profiles.json");
        let map = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<HashMap<String, Profile>>(&data) {
                Ok(map) => {
                    tracing::info!(count = map.len(), "loaded user profiles");
                    map
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "profiles.json is malformed; ignoring");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { map }
    }

    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn first_name(&self, user_id: &str) -> Option<&str> {
        self.map.get(user_id)?.first_name.as_deref()
    }
}
