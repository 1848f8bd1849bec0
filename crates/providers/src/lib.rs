//! Model collaborators — the [`ModelClient`] trait and its adapters.

pub mod openai_compat;
pub mod traits;

mod util;

pub use openai_compat::OpenAiCompatClient;
pub use traits::ModelClient;

use std::sync::Arc;

use wf_domain::config::LlmConfig;
use wf_domain::Result;

/// Build the configured model client.
pub fn create_client(cfg: &LlmConfig) -> Result<Arc<dyn ModelClient>> {
    Ok(Arc::new(OpenAiCompatClient::from_config(cfg)?))
}
