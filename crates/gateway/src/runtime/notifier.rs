//! Progress notifier — keeps the user informed while a turn runs.
//!
//! A detached task that wakes twice on a fixed schedule, re-checks the
//! user's processing status, and sends an encouraging interim message if
//! a turn is still running. It never blocks turn completion: when the
//! status has already been cleared it simply sends nothing further.

use std::sync::Arc;
use std::time::Duration;

use wf_domain::config::NotifierConfig;
use wf_sessions::UserProfiles;

use crate::outbound::MessageSender;

use super::status::StatusStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn with_name(first_name: Option<&str>) -> String {
    first_name.map(|n| format!(", {n}")).unwrap_or_default()
}

/// Acknowledgement for a repeat message while a turn is running.
pub fn wait_notice(first_name: Option<&str>) -> String {
    format!(
        "Still working on your last request{} — I'll send the results as soon as they're ready!",
        with_name(first_name)
    )
}

fn first_interim(first_name: Option<&str>) -> String {
    format!(
        "This is taking a little longer than usual{} — I'm still searching for you.",
        with_name(first_name)
    )
}

fn second_interim(first_name: Option<&str>) -> String {
    format!(
        "Almost there{}! Putting your options together now.",
        with_name(first_name)
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Notifier task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Spawn the detached notifier for one dispatched turn.
pub fn spawn(
    status: Arc<StatusStore>,
    sender: Arc<dyn MessageSender>,
    profiles: Arc<UserProfiles>,
    cfg: NotifierConfig,
    user_id: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let first_name = profiles.first_name(&user_id).map(str::to_owned);

        tokio::time::sleep(Duration::from_millis(cfg.first_delay_ms)).await;
        if !status.get(&user_id).is_processing {
            return;
        }
        tracing::debug!(user_id = %user_id, "turn still running; sending first interim notice");
        sender.send(&user_id, &first_interim(first_name.as_deref())).await;

        tokio::time::sleep(Duration::from_millis(cfg.second_delay_ms)).await;
        if !status.get(&user_id).is_processing {
            return;
        }
        tracing::debug!(user_id = %user_id, "turn still running; sending second interim notice");
        sender.send(&user_id, &second_interim(first_name.as_deref())).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::outbound::RecordingSender;

    fn fast_cfg() -> NotifierConfig {
        NotifierConfig {
            first_delay_ms: 20,
            second_delay_ms: 20,
        }
    }

    #[tokio::test]
    async fn sends_both_notices_while_busy() {
        let status = Arc::new(StatusStore::in_memory(3600));
        let sender = Arc::new(RecordingSender::default());
        status.set("u1", true, Utc::now());

        let handle = spawn(
            status,
            sender.clone(),
            Arc::new(UserProfiles::empty()),
            fast_cfg(),
            "u1".into(),
        );
        handle.await.unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1.contains("taking a little longer"));
        assert!(sent[1].1.contains("Almost there"));
    }

    #[tokio::test]
    async fn stays_silent_when_status_was_cleared() {
        let status = Arc::new(StatusStore::in_memory(3600));
        let sender = Arc::new(RecordingSender::default());
        // Never marked busy — the turn finished before the first check.

        let handle = spawn(
            status,
            sender.clone(),
            Arc::new(UserProfiles::empty()),
            fast_cfg(),
            "u1".into(),
        );
        handle.await.unwrap();

        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn sends_only_the_first_notice_when_cleared_midway() {
        let status = Arc::new(StatusStore::in_memory(3600));
        let sender = Arc::new(RecordingSender::default());
        status.set("u1", true, Utc::now());

        let handle = spawn(
            status.clone(),
            sender.clone(),
            Arc::new(UserProfiles::empty()),
            NotifierConfig {
                first_delay_ms: 10,
                second_delay_ms: 60,
            },
            "u1".into(),
        );

        // Clear after the first check fires but before the second.
        tokio::time::sleep(Duration::from_millis(35)).await;
        status.clear("u1");
        handle.await.unwrap();

        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn notices_are_personalized_when_the_name_is_known() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("profiles.json"),
            r#"{ "u1": { "first_name": "Alice" } }"#,
        )
        .unwrap();

        let status = Arc::new(StatusStore::in_memory(3600));
        let sender = Arc::new(RecordingSender::default());
        status.set("u1", true, Utc::now());

        let handle = spawn(
            status,
            sender.clone(),
            Arc::new(UserProfiles::load(dir.path())),
            fast_cfg(),
            "u1".into(),
        );
        handle.await.unwrap();

        assert!(sender.sent()[0].1.contains(", Alice"));
    }

    #[test]
    fn wait_notice_wording() {
        assert!(wait_notice(Some("Bob")).contains(", Bob"));
        assert!(!wait_notice(None).contains(','));
    }
}
