//! The completion engine seen by the orchestrator: a main model for replies
//! and a cheaper "mini" model for classification and extraction.

use std::sync::Arc;

use async_trait::async_trait;
use kd_domain::chat::ChatTurn;
use kd_domain::config::LlmConfig;
use kd_domain::error::{Error, Result};

use crate::traits::{ChatRequest, LlmProvider};

#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Generate the companion's reply from an assembled prompt.
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String>;

    /// Run a short JSON-mode classification/extraction prompt on the mini
    /// model. The returned text is expected to contain a JSON object.
    async fn complete_mini(&self, turns: &[ChatTurn]) -> Result<String>;

    fn provider_id(&self) -> &str;
}

/// [`CompletionEngine`] backed by an [`LlmProvider`].
pub struct ProviderEngine {
    provider: Arc<dyn LlmProvider>,
    model: String,
    mini_model: String,
    temperature: f32,
    mini_temperature: f32,
    max_tokens: Option<u32>,
}

impl ProviderEngine {
    pub fn new(provider: Arc<dyn LlmProvider>, cfg: &LlmConfig) -> Self {
        Self {
            provider,
            model: cfg.model.clone(),
            mini_model: cfg.mini_model.clone(),
            temperature: cfg.temperature,
            mini_temperature: cfg.mini_temperature,
            max_tokens: cfg.max_tokens,
        }
    }

    async fn run(&self, req: ChatRequest) -> Result<String> {
        let resp = self.provider.chat(&req).await?;
        let text = resp.content.trim();
        if text.is_empty() {
            return Err(Error::Provider {
                provider: self.provider.provider_id().to_owned(),
                message: format!("empty completion from {}", resp.model),
            });
        }
        Ok(text.to_owned())
    }
}

#[async_trait]
impl CompletionEngine for ProviderEngine {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        self.run(ChatRequest {
            messages: turns.to_vec(),
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            json_mode: false,
            model: Some(self.model.clone()),
        })
        .await
    }

    async fn complete_mini(&self, turns: &[ChatTurn]) -> Result<String> {
        self.run(ChatRequest {
            messages: turns.to_vec(),
            temperature: Some(self.mini_temperature),
            max_tokens: None,
            json_mode: true,
            model: Some(self.mini_model.clone()),
        })
        .await
    }

    fn provider_id(&self) -> &str {
        self.provider.provider_id()
    }
}
