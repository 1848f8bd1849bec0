use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory for all runtime state: status file, transcripts,
    /// user profiles.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Backend selection is configuration-driven, never per-request.
    #[serde(default)]
    pub backend: StatusBackend,
    /// Safety-net TTL on every busy record, so a crashed worker cannot
    /// wedge a user in the busy state forever.
    #[serde(default = "d_3600")]
    pub ttl_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            backend: StatusBackend::default(),
            ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusBackend {
    /// Durable JSON document under the state directory, advisory-locked
    /// so every process instance sharing the directory sees it.
    #[default]
    File,
    /// In-process map. Single-instance and test deployments only.
    Memory,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admission
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Repeat messages inside this window (while a turn is running) are
    /// treated as transport redeliveries and dropped without a reply.
    #[serde(default = "d_5")]
    pub suppress_window_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            suppress_window_secs: 5,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Progress notifier
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Delay before the first "still working" check.
    #[serde(default = "d_8000")]
    pub first_delay_ms: u64,
    /// Delay between the first and second check.
    #[serde(default = "d_12000")]
    pub second_delay_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            first_delay_ms: 8_000,
            second_delay_ms: 12_000,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn orchestration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Maximum model calls per turn before the loop gives up.
    #[serde(default = "d_3")]
    pub max_iterations: usize,
    /// How many transcript lines feed the model context.
    #[serde(default = "d_30")]
    pub history_limit: usize,
    /// Override for the built-in system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            history_limit: 30,
            system_prompt: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Any OpenAI-compatible chat completions endpoint.
    #[serde(default = "d_llm_url")]
    pub base_url: String,
    /// Inline API key. When absent, `api_key_env` is consulted.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "d_llm_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_llm_model")]
    pub model: String,
    #[serde(default = "d_llm_temp")]
    pub temperature: f32,
    #[serde(default = "d_120")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_llm_url(),
            api_key: None,
            api_key_env: d_llm_key_env(),
            model: d_llm_model(),
            temperature: d_llm_temp(),
            timeout_secs: 120,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outbound delivery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub mode: DeliveryMode,
    /// Required when `mode = "webhook"`. Receives `{user_id, text}`.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "d_30u")]
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            webhook_url: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Log outbound messages instead of sending (dev, tests).
    #[default]
    Log,
    /// Print outbound messages to stdout (the chat REPL).
    Console,
    /// POST outbound messages to the configured webhook.
    Webhook,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    /// HTTP-backed tools. Each entry becomes one registry tool that
    /// POSTs the call arguments to `url` and returns the response body.
    #[serde(default)]
    pub http: Vec<HttpToolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpToolConfig {
    pub name: String,
    pub url: String,
    /// Shown to the model in the system prompt.
    #[serde(default)]
    pub description: String,
    #[serde(default = "d_30u")]
    pub timeout_secs: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Default helper fns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_port() -> u16 {
    8770
}
fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_3() -> usize {
    3
}
fn d_5() -> u64 {
    5
}
fn d_30() -> usize {
    30
}
fn d_30u() -> u64 {
    30
}
fn d_120() -> u64 {
    120
}
fn d_3600() -> u64 {
    3600
}
fn d_8000() -> u64 {
    8_000
}
fn d_12000() -> u64 {
    12_000
}
fn d_llm_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_llm_key_env() -> String {
    "WAYFARER_API_KEY".into()
}
fn d_llm_model() -> String {
    "gpt-4o-mini".into()
}
fn d_llm_temp() -> f32 {
    0.2
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Config {
    /// Check the resolved configuration for problems. Errors make the
    /// gateway refuse to boot; warnings are logged and tolerated.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut err = |message: String| {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message,
            })
        };

        if self.llm.base_url.trim().is_empty() {
            err("llm.base_url must not be empty".into());
        }
        if self.turn.max_iterations == 0 {
            err("turn.max_iterations must be at least 1".into());
        }
        if self.delivery.mode == DeliveryMode::Webhook && self.delivery.webhook_url.is_none() {
            err("delivery.mode = \"webhook\" requires delivery.webhook_url".into());
        }

        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools.http {
            if tool.url.trim().is_empty() {
                err(format!("tools.http \"{}\" has an empty url", tool.name));
            }
            if !seen.insert(tool.name.as_str()) {
                err(format!("duplicate tool name \"{}\"", tool.name));
            }
        }

        if self.admission.suppress_window_secs == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "admission.suppress_window_secs = 0 disables duplicate suppression"
                    .into(),
            });
        }
        if self.status.ttl_secs == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "status.ttl_secs = 0 expires busy records immediately".into(),
            });
        }

        issues
    }
}
