//! Data model for the chat runtime: per-user processing status and the
//! parsed shapes of the text-marker tool protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Processing status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-user processing state held by the status store.
///
/// `Default` is the "not processing, never seen" value — the store hands
/// it out for unknown users instead of a not-found error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub is_processing: bool,
    pub last_request_time: Option<DateTime<Utc>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool protocol
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    /// Parsed keyword arguments (strings, numbers, booleans, nested
    /// lists/maps), already lowered to JSON values.
    pub args: serde_json::Map<String, Value>,
    /// The original call expression, kept for diagnostics only.
    pub raw_text: String,
}

/// Outcome of executing one tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_name: impl Into<String>, result: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// A model response classified by the tool-call parser.
///
/// Exactly one of two shapes: the model asked for tools, or it produced
/// the final user-facing answer. `content` never contains thinking text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    ToolCall {
        content: String,
        tool_calls: Vec<ToolCall>,
        thinking: Option<String>,
    },
    FinalResponse {
        content: String,
        thinking: Option<String>,
    },
}

impl ParsedResponse {
    pub fn content(&self) -> &str {
        match self {
            Self::ToolCall { content, .. } | Self::FinalResponse { content, .. } => content,
        }
    }

    pub fn thinking(&self) -> Option<&str> {
        match self {
            Self::ToolCall { thinking, .. } | Self::FinalResponse { thinking, .. } => {
                thinking.as_deref()
            }
        }
    }
}
