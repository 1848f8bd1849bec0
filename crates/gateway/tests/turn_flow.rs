//! End-to-end turn flow: admission → dispatch → tool loop → delivery.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use wf_domain::config::{NotifierConfig, TurnConfig};
use wf_domain::Result;
use wf_gateway::outbound::MessageSender;
use wf_gateway::runtime::admission::{Admission, AdmissionController};
use wf_gateway::runtime::dispatch::BackgroundDispatcher;
use wf_gateway::runtime::status::StatusStore;
use wf_gateway::runtime::tools::{ToolHandler, ToolRegistry};
use wf_gateway::runtime::turn::TurnOrchestrator;
use wf_providers::ModelClient;
use wf_sessions::{TranscriptLog, UserProfiles};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stub collaborators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct ScriptedModel {
    outputs: Mutex<VecDeque<String>>,
}

impl ScriptedModel {
    fn new(outputs: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            outputs: Mutex::new(outputs.iter().map(|s| s.to_string()).collect()),
        })
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, _context: &str) -> Result<String> {
        Ok(self
            .outputs
            .lock()
            .pop_front()
            .unwrap_or_else(|| "<response>out of script</response>".into()))
    }

    fn client_id(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct CaptureSender {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl MessageSender for CaptureSender {
    async fn send(&self, user_id: &str, text: &str) {
        self.sent.lock().push((user_id.to_owned(), text.to_owned()));
    }
}

struct FlightSearchStub;

#[async_trait::async_trait]
impl ToolHandler for FlightSearchStub {
    async fn call(
        &self,
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        assert_eq!(args.get("origin"), Some(&json!("SFO")));
        Ok(json!({
            "flights": [
                { "carrier": "AA", "depart": "09:10", "price_usd": 420 },
                { "carrier": "UA", "depart": "11:45", "price_usd": 455 },
            ]
        }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Harness {
    status: Arc<StatusStore>,
    admission: AdmissionController,
    dispatcher: BackgroundDispatcher,
    sender: Arc<CaptureSender>,
    transcripts: Arc<TranscriptLog>,
    _dir: tempfile::TempDir,
}

fn harness(model: Arc<dyn ModelClient>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let status = Arc::new(StatusStore::in_memory(3600));
    let sender = Arc::new(CaptureSender::default());
    let transcripts = Arc::new(TranscriptLog::new(dir.path()));

    let mut registry = ToolRegistry::new();
    registry.register(
        "search_flights",
        "Search for flights between two airports.",
        Arc::new(FlightSearchStub),
    );

    let orchestrator = Arc::new(TurnOrchestrator::new(model, Arc::new(registry), 3));
    let admission = AdmissionController::new(status.clone(), 5);
    let dispatcher = BackgroundDispatcher::new(
        status.clone(),
        sender.clone(),
        transcripts.clone(),
        Arc::new(UserProfiles::empty()),
        orchestrator,
        NotifierConfig {
            first_delay_ms: 60_000,
            second_delay_ms: 60_000,
        },
        TurnConfig::default(),
    );

    Harness {
        status,
        admission,
        dispatcher,
        sender,
        transcripts,
        _dir: dir,
    }
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..300 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn flight_search_turn_runs_end_to_end() {
    let model = ScriptedModel::new(&[
        "<thinking>need availability</thinking>\
         <call>search_flights(origin='SFO', dest='JFK', date='2026-09-01')</call>",
        "<response>Two options: AA at 09:10 for $420, UA at 11:45 for $455.</response>",
    ]);
    let h = harness(model);

    assert_eq!(
        h.admission.decide("u1", chrono::Utc::now()),
        Admission::Start
    );
    h.dispatcher.dispatch("u1", "book me a flight");

    wait_for(|| !h.sender.sent.lock().is_empty()).await;
    let sent = h.sender.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "u1");
    assert!(sent[0].1.contains("AA at 09:10 for $420"));

    // Busy record is gone after completion.
    wait_for(|| !h.status.get("u1").is_processing).await;

    // Two raw model outputs were logged for this turn.
    let model_lines = h
        .transcripts
        .history("u1", 20)
        .into_iter()
        .filter(|l| l.role == "model")
        .count();
    assert_eq!(model_lines, 2);
}

#[tokio::test]
async fn duplicates_are_suppressed_while_a_turn_runs() {
    // A model that stalls long enough for a duplicate to arrive.
    struct SlowModel;

    #[async_trait::async_trait]
    impl ModelClient for SlowModel {
        async fn generate(&self, _context: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok("<response>done</response>".into())
        }

        fn client_id(&self) -> &str {
            "slow"
        }
    }

    let h = harness(Arc::new(SlowModel));

    let now = chrono::Utc::now();
    assert_eq!(h.admission.decide("u1", now), Admission::Start);
    h.dispatcher.dispatch("u1", "first message");

    // A redelivery two seconds "later" while the turn is running.
    assert_eq!(
        h.admission
            .decide("u1", now + chrono::Duration::seconds(2)),
        Admission::Suppress
    );
    // And one past the window earns a wait notice.
    assert_eq!(
        h.admission
            .decide("u1", now + chrono::Duration::seconds(6)),
        Admission::WaitNotice
    );

    // After completion the user is admitted again.
    wait_for(|| !h.status.get("u1").is_processing).await;
    assert_eq!(
        h.admission
            .decide("u1", now + chrono::Duration::seconds(30)),
        Admission::Start
    );
}
