//! AppState construction — the shared "boot" path used by `serve` and
//! `chat` so both wire the full runtime the same way.

use std::sync::Arc;

use anyhow::Context;

use wf_domain::config::{Config, ConfigSeverity};
use wf_sessions::{TranscriptLog, UserProfiles};

use crate::outbound::create_sender;
use crate::runtime::admission::AdmissionController;
use crate::runtime::dispatch::BackgroundDispatcher;
use crate::runtime::status::StatusStore;
use crate::runtime::tools::{HttpTool, ToolRegistry};
use crate::runtime::turn::TurnOrchestrator;
use crate::state::AppState;

/// Validate config, initialize every subsystem, and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── State directory ──────────────────────────────────────────────
    std::fs::create_dir_all(&config.workspace.state_path)
        .context("creating state directory")?;

    // ── Status store ─────────────────────────────────────────────────
    let status = Arc::new(StatusStore::from_config(
        &config.status,
        &config.workspace.state_path,
    ));
    tracing::info!(
        backend = ?config.status.backend,
        ttl_secs = config.status.ttl_secs,
        "status store ready"
    );

    // ── Transcripts + profiles ───────────────────────────────────────
    let transcripts = Arc::new(TranscriptLog::new(&config.workspace.state_path));
    let profiles = Arc::new(UserProfiles::load(&config.workspace.state_path));

    // ── Model client ─────────────────────────────────────────────────
    let model = wf_providers::create_client(&config.llm).context("initializing model client")?;
    tracing::info!(client = model.client_id(), "model client ready");

    // ── Tool registry ────────────────────────────────────────────────
    let mut registry = ToolRegistry::new();
    for tool_cfg in &config.tools.http {
        let handler = HttpTool::new(tool_cfg)
            .with_context(|| format!("initializing tool '{}'", tool_cfg.name))?;
        registry.register(
            tool_cfg.name.clone(),
            tool_cfg.description.clone(),
            Arc::new(handler),
        );
    }
    if registry.is_empty() {
        tracing::info!("no tools configured — the model can only answer directly");
    } else {
        tracing::info!(tools = registry.len(), "tool registry ready");
    }

    // ── Outbound delivery ────────────────────────────────────────────
    let sender = create_sender(&config.delivery).context("initializing outbound delivery")?;
    tracing::info!(mode = ?config.delivery.mode, "outbound delivery ready");

    // ── Core runtime ─────────────────────────────────────────────────
    let orchestrator = Arc::new(TurnOrchestrator::new(
        model,
        Arc::new(registry),
        config.turn.max_iterations,
    ));
    let admission = Arc::new(AdmissionController::new(
        status.clone(),
        config.admission.suppress_window_secs,
    ));
    let dispatcher = Arc::new(BackgroundDispatcher::new(
        status.clone(),
        sender.clone(),
        transcripts.clone(),
        profiles.clone(),
        orchestrator,
        config.notifier.clone(),
        config.turn.clone(),
    ));

    Ok(AppState {
        config,
        status,
        admission,
        dispatcher,
        sender,
        profiles,
        transcripts,
    })
}
