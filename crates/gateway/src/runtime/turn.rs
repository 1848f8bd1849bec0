//! Turn orchestrator — the bounded call-model/parse/execute loop.
//!
//! One invocation owns one turn: it repeatedly calls the model, parses
//! the completion, executes any requested tools, and feeds the results
//! back into the context until the model produces a final response or
//! the iteration cap is hit. Model failures end the turn with the
//! fixed apology; they are never retried and never propagate.

use std::sync::Arc;

use serde_json::Value;

use wf_domain::chat::{ParsedResponse, ToolResult};
use wf_providers::ModelClient;
use wf_sessions::TranscriptLine;

use super::tools::{self, ToolRegistry, ToolSpec};
use super::{parser, EXHAUSTED_APOLOGY};

/// What a finished turn hands back to the dispatcher.
#[derive(Debug)]
pub struct TurnOutcome {
    /// User-facing reply: the model's final response, or the apology.
    pub reply: String,
    /// Every raw model output in order, plus error markers. Persisted by
    /// the dispatcher for diagnostics.
    pub response_log: Vec<String>,
}

pub struct TurnOrchestrator {
    model: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
}

impl TurnOrchestrator {
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, max_iterations: usize) -> Self {
        Self {
            model,
            tools,
            max_iterations,
        }
    }

    /// Tool names and descriptions for prompt assembly.
    pub fn tool_specs(&self) -> &[ToolSpec] {
        self.tools.specs()
    }

    /// Drive one turn to completion.
    pub async fn run(&self, context: String) -> TurnOutcome {
        let mut context = context;
        let mut response_log: Vec<String> = Vec::new();

        for iteration in 0..self.max_iterations {
            let raw = match self.model.generate(&context).await {
                Ok(raw) => raw,
                Err(e) => {
                    // Transport failure — not a retry loop. End the turn.
                    tracing::warn!(iteration, error = %e, "model call failed; ending turn");
                    response_log.push(format!("[model error: {e}]"));
                    return TurnOutcome {
                        reply: EXHAUSTED_APOLOGY.to_owned(),
                        response_log,
                    };
                }
            };
            response_log.push(raw.clone());

            match parser::parse(&raw) {
                ParsedResponse::FinalResponse { content, .. } => {
                    tracing::debug!(iteration, "turn reached a final response");
                    return TurnOutcome {
                        reply: content,
                        response_log,
                    };
                }
                ParsedResponse::ToolCall { tool_calls, .. } => {
                    tracing::debug!(
                        iteration,
                        count = tool_calls.len(),
                        "executing tool calls"
                    );
                    let results = tools::execute_batch(&self.tools, &tool_calls).await;
                    context.push_str(&render_continuation(&raw, &results));
                }
            }
        }

        tracing::warn!(max_iterations = self.max_iterations, "iteration cap hit without a final response");
        TurnOutcome {
            reply: EXHAUSTED_APOLOGY.to_owned(),
            response_log,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context assembly
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default persona when `turn.system_prompt` is not configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Wayfarer, a friendly flight-search assistant. \
     Help the user find and compare flights. Be concise and concrete.";

/// Assemble the context string for the first model call of a turn.
pub fn build_context(
    system_prompt: &str,
    specs: &[ToolSpec],
    history: &[TranscriptLine],
    user_message: &str,
) -> String {
    let mut out = String::new();
    out.push_str(system_prompt);
    out.push_str("\n\n");

    if !specs.is_empty() {
        out.push_str("Available tools:\n");
        for spec in specs {
            out.push_str(&format!("- {}: {}\n", spec.name, spec.description));
        }
        out.push('\n');
    }

    out.push_str(
        "Protocol: think privately inside <thinking></thinking>. \
         To call a tool, write <call>tool_name(key='value', n=2)</call>. \
         When you can answer the user, wrap the reply in <response></response>.\n\n",
    );

    if !history.is_empty() {
        out.push_str("Conversation so far:\n");
        for line in history {
            let speaker = match line.role.as_str() {
                "assistant" => "Assistant",
                _ => "User",
            };
            out.push_str(&format!("{speaker}: {}\n", line.text));
        }
        out.push('\n');
    }

    out.push_str(&format!("User: {user_message}\nAssistant:"));
    out
}

/// Serialize tool results into a model-readable continuation: the
/// assistant's own output, then each result labelled with its tool name,
/// then the instruction to continue.
fn render_continuation(raw: &str, results: &[ToolResult]) -> String {
    let mut out = String::new();
    out.push_str("\n\nAssistant: ");
    out.push_str(raw.trim());
    out.push_str("\n\n<tool_results>\n");

    for r in results {
        let payload = if r.success {
            r.result.clone().unwrap_or(Value::Null)
        } else {
            serde_json::json!({ "error": r.error })
        };
        let body = serde_json::to_string(&payload).unwrap_or_else(|e| {
            tracing::warn!(tool = %r.tool_name, error = %e, "failed to serialize tool result");
            "null".to_owned()
        });
        out.push_str(&format!(
            "<result tool=\"{}\">{}</result>\n",
            r.tool_name, body
        ));
    }

    out.push_str(
        "</tool_results>\n\nContinue with the user's request using the tool results above. \
         Reply with <response></response> when you have the final answer, \
         or make another tool call.\nAssistant:",
    );
    out
}
