//! Shared utility functions for provider adapters.

use kd_domain::config::LlmConfig;
use kd_domain::error::Error;

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

/// Resolve the API key for the configured endpoint.
///
/// Precedence:
/// 1. `api_key` field (plaintext, warns)
/// 2. the environment variable named by `api_key_env`
/// 3. no key; local servers such as Ollama accept unauthenticated requests
pub(crate) fn resolve_api_key(cfg: &LlmConfig) -> Option<String> {
    if let Some(ref key) = cfg.api_key {
        tracing::warn!(
            "API key loaded from plaintext config field 'api_key', prefer 'api_key_env'"
        );
        return Some(key.clone());
    }
    if cfg.api_key_env.is_empty() {
        return None;
    }
    match std::env::var(&cfg.api_key_env) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => {
            tracing::warn!(
                env_var = %cfg.api_key_env,
                "API key env var not set, sending requests without Authorization"
            );
            None
        }
    }
}

/// Error for a non-2xx provider response. The body is truncated so a
/// verbose HTML error page does not flood the logs.
pub(crate) fn status_error(provider: &str, status: u16, body: &str) -> Error {
    const MAX_BODY: usize = 512;
    let body = if body.chars().count() > MAX_BODY {
        let cut: String = body.chars().take(MAX_BODY).collect();
        format!("{cut}…")
    } else {
        body.to_owned()
    };
    Error::Provider {
        provider: provider.to_owned(),
        message: format!("HTTP {status} - {body}"),
    }
}
