//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Azure-style proxies, Ollama, vLLM, Together, and any
//! other endpoint that follows the OpenAI chat completions contract. The
//! context string goes out as a single user message; the first choice's
//! message content comes back as the raw completion.

use serde_json::Value;

use wf_domain::config::LlmConfig;
use wf_domain::{Error, Result};

use crate::traits::ModelClient;
use crate::util::{from_reqwest, resolve_api_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A model client for any OpenAI-compatible API endpoint.
pub struct OpenAiCompatClient {
    id: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new client from the deserialized LLM config.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(cfg)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: format!("openai_compat/{}", cfg.model),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            client,
        })
    }

    fn build_body(&self, context: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": context }
            ],
            "temperature": self.temperature,
            "stream": false,
        })
    }
}

#[async_trait::async_trait]
impl ModelClient for OpenAiCompatClient {
    async fn generate(&self, context: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(context);

        tracing::debug!(client = %self.id, url = %url, "chat completion request");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Model {
                client: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        extract_content(&resp_json).ok_or_else(|| Error::Model {
            client: self.id.clone(),
            message: "response has no choices[0].message.content".into(),
        })
    }

    fn client_id(&self) -> &str {
        &self.id
    }
}

/// Pull `choices[0].message.content` out of a chat completions response.
fn extract_content(resp: &Value) -> Option<String> {
    resp.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let resp = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "hello" } }
            ]
        });
        assert_eq!(extract_content(&resp).as_deref(), Some("hello"));
    }

    #[test]
    fn missing_content_is_none() {
        let resp = serde_json::json!({ "choices": [] });
        assert_eq!(extract_content(&resp), None);
    }
}
