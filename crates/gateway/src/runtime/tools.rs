//! Tool registry and batch executor.
//!
//! The registry maps tool names to handlers. It is built once at startup
//! and shared read-only across all concurrent turns. Execution failures
//! are captured per call — a failing tool never aborts the rest of the
//! batch or the orchestration loop; the model sees a structured error
//! result instead and can adapt.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use wf_domain::chat::{ToolCall, ToolResult};
use wf_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler trait + registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A callable tool. Implementations receive the parsed keyword arguments
/// and return an arbitrary structured value.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &serde_json::Map<String, Value>) -> Result<Value>;
}

/// Name + description pair, rendered into the system prompt.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolHandler>>,
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
    ) {
        let name = name.into();
        self.specs.push(ToolSpec {
            name: name.clone(),
            description: description.into(),
        });
        self.tools.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.get(name)
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Batch execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Execute a batch of tool calls.
///
/// Calls run concurrently; results come back in parse order so the
/// continuation fed to the model is deterministic.
pub async fn execute_batch(registry: &ToolRegistry, calls: &[ToolCall]) -> Vec<ToolResult> {
    let futures: Vec<_> = calls.iter().map(|tc| execute_one(registry, tc)).collect();
    futures_util::future::join_all(futures).await
}

async fn execute_one(registry: &ToolRegistry, call: &ToolCall) -> ToolResult {
    let Some(handler) = registry.get(&call.name) else {
        tracing::warn!(tool = %call.name, "model requested an unknown tool");
        return ToolResult::failed(&call.name, format!("unknown tool: {}", call.name));
    };

    match handler.call(&call.args).await {
        Ok(value) => ToolResult::ok(&call.name, value),
        Err(e) => {
            tracing::warn!(tool = %call.name, error = %e, "tool execution failed");
            ToolResult::failed(&call.name, e.to_string())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP-backed tool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A tool that lives behind an HTTP endpoint: call arguments go out as a
/// JSON POST body, the response body comes back as the structured result.
/// This is how external collaborators (e.g. the flight-search service)
/// plug into the registry without their clients living in this crate.
pub struct HttpTool {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpTool {
    pub fn new(cfg: &wf_domain::config::HttpToolConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            name: cfg.name.clone(),
            url: cfg.url.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl ToolHandler for HttpTool {
    async fn call(&self, args: &serde_json::Map<String, Value>) -> Result<Value> {
        let resp = self
            .client
            .post(&self.url)
            .json(&Value::Object(args.clone()))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("tool {}: {e}", self.name))
                } else {
                    Error::Http(format!("tool {}: {e}", self.name))
                }
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Http(format!("tool {}: {e}", self.name)))?;

        if !status.is_success() {
            return Err(Error::Http(format!(
                "tool {} returned HTTP {}: {}",
                self.name,
                status.as_u16(),
                super::truncate_str(&body, 200),
            )));
        }

        // Non-JSON bodies still make a usable result.
        Ok(serde_json::from_str(&body)
            .unwrap_or_else(|_| serde_json::json!({ "text": body })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wf_domain::chat::ToolCall;

    struct Echo;

    #[async_trait::async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, args: &serde_json::Map<String, Value>) -> Result<Value> {
            Ok(Value::Object(args.clone()))
        }
    }

    struct AlwaysFails;

    #[async_trait::async_trait]
    impl ToolHandler for AlwaysFails {
        async fn call(&self, _args: &serde_json::Map<String, Value>) -> Result<Value> {
            Err(Error::Other("boom".into()))
        }
    }

    fn call(name: &str, args: Value) -> ToolCall {
        let Value::Object(args) = args else {
            panic!("args must be an object");
        };
        ToolCall {
            name: name.into(),
            args,
            raw_text: format!("{name}(...)"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_raising() {
        let mut registry = ToolRegistry::new();
        registry.register("search", "find flights", Arc::new(Echo));

        let results = execute_batch(&registry, &[call("lookup", json!({}))]).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn failing_tool_does_not_abort_the_batch() {
        let mut registry = ToolRegistry::new();
        registry.register("boom", "always fails", Arc::new(AlwaysFails));
        registry.register("echo", "echoes args", Arc::new(Echo));

        let calls = [
            call("boom", json!({})),
            call("echo", json!({ "x": 1 })),
        ];
        let results = execute_batch(&registry, &calls).await;

        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("boom"));
        assert!(results[1].success);
        assert_eq!(results[1].result, Some(json!({ "x": 1 })));
    }

    async fn serve_stub(
        handler: axum::routing::MethodRouter,
    ) -> std::net::SocketAddr {
        let app = axum::Router::new().route("/tool", handler);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn http_registry(addr: std::net::SocketAddr) -> ToolRegistry {
        let cfg = wf_domain::config::HttpToolConfig {
            name: "search".into(),
            url: format!("http://{addr}/tool"),
            description: "remote search".into(),
            timeout_secs: 5,
        };
        let mut registry = ToolRegistry::new();
        registry.register("search", "remote search", Arc::new(HttpTool::new(&cfg).unwrap()));
        registry
    }

    #[tokio::test]
    async fn http_tool_returns_the_response_body() {
        let addr = serve_stub(axum::routing::post(|| async {
            axum::Json(serde_json::json!({ "ok": true }))
        }))
        .await;
        let registry = http_registry(addr);

        let results = execute_batch(&registry, &[call("search", json!({ "q": "SFO" }))]).await;
        assert!(results[0].success);
        assert_eq!(results[0].result, Some(json!({ "ok": true })));
    }

    #[tokio::test]
    async fn http_tool_surfaces_non_success_as_a_failed_result() {
        let addr = serve_stub(axum::routing::post(|| async {
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "backend down")
        }))
        .await;
        let registry = http_registry(addr);

        let results = execute_batch(&registry, &[call("search", json!({}))]).await;
        assert!(!results[0].success);
        let error = results[0].error.as_deref().unwrap();
        assert!(error.contains("HTTP 500"), "unexpected error: {error}");
    }

    #[tokio::test]
    async fn results_preserve_call_order() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", "echoes args", Arc::new(Echo));

        let calls: Vec<ToolCall> = (0..4)
            .map(|i| call("echo", json!({ "i": i })))
            .collect();
        let results = execute_batch(&registry, &calls).await;

        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.result, Some(json!({ "i": i })));
        }
    }
}
