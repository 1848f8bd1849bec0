//! `wayfarer chat` — interactive REPL command.
//!
//! Drives the real admission/dispatch pipeline with REPL-friendly
//! overrides: in-process status backend, console delivery, and snappy
//! notifier delays so the "still working" texture is visible.

use std::sync::Arc;
use std::time::Duration;

use wf_domain::config::{Config, DeliveryMode, StatusBackend};

use crate::bootstrap;
use crate::runtime::admission::Admission;

/// How long the REPL waits for a turn before giving the prompt back.
const TURN_WAIT: Duration = Duration::from_secs(120);

/// Run the interactive chat REPL.
pub async fn chat(config: Arc<Config>, user: String) -> anyhow::Result<()> {
    let mut cfg = (*config).clone();
    cfg.status.backend = StatusBackend::Memory;
    cfg.delivery.mode = DeliveryMode::Console;
    cfg.notifier.first_delay_ms = 2_000;
    cfg.notifier.second_delay_ms = 3_000;

    let state = bootstrap::build_app_state(Arc::new(cfg)).await?;

    // Readline with persistent history.
    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".wayfarer")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("Wayfarer interactive chat");
    eprintln!("User: {user}  |  Ctrl+D to exit");
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                match state.admission.decide(&user, chrono::Utc::now()) {
                    Admission::Start => {
                        state.dispatcher.dispatch(&user, trimmed);
                        wait_for_turn(&state, &user).await;
                    }
                    // The REPL waits for each turn, so these only appear
                    // when a previous turn is still draining.
                    Admission::WaitNotice | Admission::Suppress => {
                        eprintln!("(still working on the previous message)");
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

/// Poll the status store until the dispatched turn clears its busy
/// record (the console sender has printed the reply by then).
async fn wait_for_turn(state: &crate::state::AppState, user: &str) {
    let deadline = tokio::time::Instant::now() + TURN_WAIT;
    loop {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if !state.status.get(user).is_processing {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            eprintln!("(turn is taking very long — giving you the prompt back)");
            return;
        }
    }
}
