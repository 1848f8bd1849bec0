use wf_domain::Result;

/// Trait implemented by every model adapter.
///
/// The tool protocol runs over plain text: one context string in, one raw
/// completion out. No streaming — the protocol engine classifies complete
/// responses only.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate a completion for the given context. Errors are transport
    /// failures; the caller decides how they surface to the user.
    async fn generate(&self, context: &str) -> Result<String>;

    /// A unique identifier for this client instance (used in logs).
    fn client_id(&self) -> &str;
}
