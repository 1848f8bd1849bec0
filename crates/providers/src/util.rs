//! Shared utility functions for model adapters.

use wf_domain::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key: inline config value first, then the configured
/// environment variable.
pub(crate) fn resolve_api_key(cfg: &wf_domain::config::LlmConfig) -> Result<String> {
    if let Some(ref key) = cfg.api_key {
        tracing::warn!(
            "API key loaded from plaintext config field 'api_key' — \
             prefer 'api_key_env' instead"
        );
        return Ok(key.clone());
    }
    std::env::var(&cfg.api_key_env).map_err(|_| {
        Error::Config(format!(
            "environment variable '{}' not set or not valid UTF-8",
            cfg.api_key_env
        ))
    })
}
