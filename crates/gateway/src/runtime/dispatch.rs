//! Background dispatcher — runs admitted turns off the request path.
//!
//! `dispatch` marks the user busy, starts the detached progress notifier
//! and the detached turn task, and returns immediately. The turn task is
//! supervised: whatever way it exits — final response, exhaustion, or a
//! panic somewhere in a tool — the busy record is cleared afterwards, and
//! a panic surfaces to the user as a generic apology rather than silence.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use wf_domain::config::{NotifierConfig, TurnConfig};
use wf_sessions::{TranscriptLog, UserProfiles};

use crate::outbound::MessageSender;

use super::notifier;
use super::status::StatusStore;
use super::turn::{build_context, TurnOrchestrator, DEFAULT_SYSTEM_PROMPT};
use super::FAILURE_APOLOGY;

pub struct BackgroundDispatcher {
    status: Arc<StatusStore>,
    sender: Arc<dyn MessageSender>,
    transcripts: Arc<TranscriptLog>,
    profiles: Arc<UserProfiles>,
    orchestrator: Arc<TurnOrchestrator>,
    notifier_cfg: NotifierConfig,
    turn_cfg: TurnConfig,
}

impl BackgroundDispatcher {
    pub fn new(
        status: Arc<StatusStore>,
        sender: Arc<dyn MessageSender>,
        transcripts: Arc<TranscriptLog>,
        profiles: Arc<UserProfiles>,
        orchestrator: Arc<TurnOrchestrator>,
        notifier_cfg: NotifierConfig,
        turn_cfg: TurnConfig,
    ) -> Self {
        Self {
            status,
            sender,
            transcripts,
            profiles,
            orchestrator,
            notifier_cfg,
            turn_cfg,
        }
    }

    /// Take one admitted message off the request path.
    ///
    /// Call only after the admission controller returned `Start`.
    pub fn dispatch(&self, user_id: &str, message: &str) {
        let turn_id = Uuid::new_v4();
        tracing::info!(user_id = %user_id, %turn_id, "dispatching turn");

        // 1. Mark busy before anything else can observe this user.
        self.status.set(user_id, true, Utc::now());

        // 2. Detached progress notifier.
        notifier::spawn(
            self.status.clone(),
            self.sender.clone(),
            self.profiles.clone(),
            self.notifier_cfg.clone(),
            user_id.to_owned(),
        );

        // 3. Detached, supervised turn task.
        let status = self.status.clone();
        let sender = self.sender.clone();
        let transcripts = self.transcripts.clone();
        let orchestrator = self.orchestrator.clone();
        let turn_cfg = self.turn_cfg.clone();
        let user_id = user_id.to_owned();
        let message = message.to_owned();

        tokio::spawn(async move {
            // Clears the busy record on every exit path, panics included.
            let _guard = StatusClearGuard {
                status,
                user_id: user_id.clone(),
            };

            let turn = tokio::spawn(run_turn(
                orchestrator,
                transcripts,
                sender.clone(),
                turn_cfg,
                user_id.clone(),
                message,
            ));

            if let Err(e) = turn.await {
                tracing::error!(user_id = %user_id, %turn_id, error = %e, "turn task died");
                sender.send(&user_id, FAILURE_APOLOGY).await;
            }
        });
    }
}

/// Run one turn end to end: read history, drive the orchestrator, persist
/// the exchange, deliver the reply.
async fn run_turn(
    orchestrator: Arc<TurnOrchestrator>,
    transcripts: Arc<TranscriptLog>,
    sender: Arc<dyn MessageSender>,
    turn_cfg: TurnConfig,
    user_id: String,
    message: String,
) {
    // History first, then append — the new message goes into the context
    // explicitly, not through the history.
    let mut history = transcripts.history(&user_id, turn_cfg.history_limit);
    history.retain(|l| l.role == "user" || l.role == "assistant");
    transcripts.append(&user_id, "user", &message);

    let system_prompt = turn_cfg
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let context = build_context(
        system_prompt,
        orchestrator.tool_specs(),
        &history,
        &message,
    );

    let outcome = orchestrator.run(context).await;

    // Raw model outputs are kept alongside the conversation for
    // diagnostics; the history filter above keeps them out of prompts.
    for raw in &outcome.response_log {
        transcripts.append(&user_id, "model", raw);
    }
    transcripts.append(&user_id, "assistant", &outcome.reply);

    sender.send(&user_id, &outcome.reply).await;
}

/// Guarantees `StatusStore::clear` runs whether the turn succeeded,
/// panicked, or exhausted its iterations.
struct StatusClearGuard {
    status: Arc<StatusStore>,
    user_id: String,
}

impl Drop for StatusClearGuard {
    fn drop(&mut self) {
        self.status.clear(&self.user_id);
        tracing::debug!(user_id = %self.user_id, "processing status cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use wf_domain::Result;
    use wf_providers::ModelClient;

    use crate::outbound::RecordingSender;
    use crate::runtime::tools::{ToolHandler, ToolRegistry};
    use crate::runtime::EXHAUSTED_APOLOGY;

    struct OneShotModel(String);

    #[async_trait::async_trait]
    impl ModelClient for OneShotModel {
        async fn generate(&self, _context: &str) -> Result<String> {
            Ok(self.0.clone())
        }

        fn client_id(&self) -> &str {
            "one-shot"
        }
    }

    struct PanickingTool;

    #[async_trait::async_trait]
    impl ToolHandler for PanickingTool {
        async fn call(
            &self,
            _args: &serde_json::Map<String, serde_json::Value>,
        ) -> Result<serde_json::Value> {
            panic!("tool blew up");
        }
    }

    fn quiet_notifier() -> NotifierConfig {
        // Far beyond test duration, so interim notices stay out of the way.
        NotifierConfig {
            first_delay_ms: 60_000,
            second_delay_ms: 60_000,
        }
    }

    fn dispatcher(
        model: Arc<dyn ModelClient>,
        registry: ToolRegistry,
        status: Arc<StatusStore>,
        sender: Arc<RecordingSender>,
        transcripts: Arc<TranscriptLog>,
    ) -> BackgroundDispatcher {
        let orchestrator = Arc::new(TurnOrchestrator::new(model, Arc::new(registry), 3));
        BackgroundDispatcher::new(
            status,
            sender,
            transcripts,
            Arc::new(UserProfiles::empty()),
            orchestrator,
            quiet_notifier(),
            TurnConfig::default(),
        )
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn happy_path_delivers_and_clears_status() {
        let dir = tempfile::tempdir().unwrap();
        let status = Arc::new(StatusStore::in_memory(3600));
        let sender = Arc::new(RecordingSender::default());
        let transcripts = Arc::new(TranscriptLog::new(dir.path()));

        let d = dispatcher(
            Arc::new(OneShotModel("<response>All set!</response>".into())),
            ToolRegistry::new(),
            status.clone(),
            sender.clone(),
            transcripts.clone(),
        );

        d.dispatch("u1", "book me a flight");
        assert!(status.get("u1").is_processing, "busy right after dispatch");

        wait_for(|| !sender.sent().is_empty()).await;
        assert_eq!(sender.sent()[0], ("u1".into(), "All set!".into()));

        wait_for(|| !status.get("u1").is_processing).await;

        let lines = transcripts.history("u1", 10);
        let roles: Vec<&str> = lines.iter().map(|l| l.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "assistant"]);
    }

    #[tokio::test]
    async fn panicking_turn_still_clears_status_and_apologizes() {
        let dir = tempfile::tempdir().unwrap();
        let status = Arc::new(StatusStore::in_memory(3600));
        let sender = Arc::new(RecordingSender::default());
        let transcripts = Arc::new(TranscriptLog::new(dir.path()));

        let mut registry = ToolRegistry::new();
        registry.register("search", "blows up", Arc::new(PanickingTool));

        let d = dispatcher(
            Arc::new(OneShotModel("<call>search(x=1)</call>".into())),
            registry,
            status.clone(),
            sender.clone(),
            transcripts,
        );

        d.dispatch("u1", "hi");

        wait_for(|| !sender.sent().is_empty()).await;
        assert_eq!(sender.sent()[0].1, FAILURE_APOLOGY);

        wait_for(|| !status.get("u1").is_processing).await;
    }

    #[tokio::test]
    async fn exhausted_turn_delivers_the_fixed_apology() {
        let dir = tempfile::tempdir().unwrap();
        let status = Arc::new(StatusStore::in_memory(3600));
        let sender = Arc::new(RecordingSender::default());
        let transcripts = Arc::new(TranscriptLog::new(dir.path()));

        // Model always asks for a tool nobody registered.
        let d = dispatcher(
            Arc::new(OneShotModel("<call>search(x=1)</call>".into())),
            ToolRegistry::new(),
            status.clone(),
            sender.clone(),
            transcripts,
        );

        d.dispatch("u1", "hi");

        wait_for(|| !sender.sent().is_empty()).await;
        assert_eq!(sender.sent()[0].1, EXHAUSTED_APOLOGY);
        wait_for(|| !status.get("u1").is_processing).await;
    }

    #[tokio::test]
    async fn prior_history_reaches_the_model_without_duplication() {
        let dir = tempfile::tempdir().unwrap();
        let status = Arc::new(StatusStore::in_memory(3600));
        let sender = Arc::new(RecordingSender::default());
        let transcripts = Arc::new(TranscriptLog::new(dir.path()));
        transcripts.append("u1", "user", "earlier question");
        transcripts.append("u1", "assistant", "earlier answer");

        let d = dispatcher(
            Arc::new(OneShotModel("<response>ok</response>".into())),
            ToolRegistry::new(),
            status.clone(),
            sender.clone(),
            transcripts.clone(),
        );

        d.dispatch("u1", "new question");
        wait_for(|| !sender.sent().is_empty()).await;
        wait_for(|| !status.get("u1").is_processing).await;

        // The transcript now carries both exchanges in order; the new
        // message appears once.
        let texts: Vec<String> = transcripts
            .history("u1", 10)
            .into_iter()
            .filter(|l| l.role == "user")
            .map(|l| l.text)
            .collect();
        assert_eq!(texts, vec!["earlier question", "new question"]);
    }
}
