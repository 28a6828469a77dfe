use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Completion engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One OpenAI-compatible endpoint serving both the main reply model and the
/// cheaper "mini" model used for classification and extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_provider_id")]
    pub provider_id: String,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Plaintext key. Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_mini_model")]
    pub mini_model: String,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_mini_temperature")]
    pub mini_temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// HTTP client timeout. The orchestrator applies its own, usually
    /// shorter, bound on top.
    #[serde(default = "d_120000")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_id: d_provider_id(),
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            api_key: None,
            model: d_model(),
            mini_model: d_mini_model(),
            temperature: d_temperature(),
            mini_temperature: d_mini_temperature(),
            max_tokens: None,
            timeout_ms: 120_000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_provider_id() -> String {
    "openai".into()
}
fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_model() -> String {
    "gpt-4o".into()
}
fn d_mini_model() -> String {
    "gpt-4o-mini".into()
}
fn d_temperature() -> f32 {
    0.8
}
fn d_mini_temperature() -> f32 {
    0.2
}
fn d_120000() -> u64 {
    120_000
}
