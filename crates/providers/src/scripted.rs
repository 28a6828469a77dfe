//! Deterministic [`CompletionEngine`] for tests and offline runs.
//!
//! Replies are served from FIFO queues; when a queue is empty the default
//! reply is used (or an error, when none is configured). Every call is
//! recorded so tests can assert on prompts and call counts.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use kd_domain::chat::ChatTurn;
use kd_domain::error::{Error, Result};
use parking_lot::Mutex;

use crate::engine::CompletionEngine;

#[derive(Default)]
struct Script {
    replies: VecDeque<Result<String>>,
    mini_replies: VecDeque<Result<String>>,
    default_reply: Option<String>,
    default_mini: Option<String>,
    calls: Vec<Vec<ChatTurn>>,
    mini_calls: Vec<Vec<ChatTurn>>,
}

#[derive(Default)]
pub struct ScriptedEngine {
    script: Mutex<Script>,
    latency: Duration,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply used by `complete` once the queue is drained.
    pub fn with_default_reply(self, reply: impl Into<String>) -> Self {
        self.script.lock().default_reply = Some(reply.into());
        self
    }

    /// Reply used by `complete_mini` once the queue is drained.
    pub fn with_default_mini(self, reply: impl Into<String>) -> Self {
        self.script.lock().default_mini = Some(reply.into());
        self
    }

    /// Simulated engine latency, observed with `tokio::time::sleep` so
    /// paused-clock tests stay deterministic.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.script.lock().replies.push_back(Ok(reply.into()));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.script.lock().replies.push_back(Err(Error::Provider {
            provider: "scripted".into(),
            message: message.into(),
        }));
    }

    pub fn push_mini_reply(&self, reply: impl Into<String>) {
        self.script.lock().mini_replies.push_back(Ok(reply.into()));
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.script.lock().calls.len()
    }

    pub fn mini_calls(&self) -> usize {
        self.script.lock().mini_calls.len()
    }

    /// Prompts passed to `complete`, in call order.
    pub fn prompts(&self) -> Vec<Vec<ChatTurn>> {
        self.script.lock().calls.clone()
    }

    pub fn mini_prompts(&self) -> Vec<Vec<ChatTurn>> {
        self.script.lock().mini_calls.clone()
    }
}

fn unscripted(kind: &str) -> Error {
    Error::Provider {
        provider: "scripted".into(),
        message: format!("no {kind} reply scripted"),
    }
}

#[async_trait]
impl CompletionEngine for ScriptedEngine {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let next = {
            let mut s = self.script.lock();
            s.calls.push(turns.to_vec());
            match s.replies.pop_front() {
                Some(r) => r,
                None => s.default_reply.clone().ok_or_else(|| unscripted("completion")),
            }
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        next
    }

    async fn complete_mini(&self, turns: &[ChatTurn]) -> Result<String> {
        let mut s = self.script.lock();
        s.mini_calls.push(turns.to_vec());
        match s.mini_replies.pop_front() {
            Some(r) => r,
            None => s.default_mini.clone().ok_or_else(|| unscripted("mini")),
        }
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_then_default() {
        let engine = ScriptedEngine::new().with_default_reply("fallback");
        engine.push_reply("first");
        engine.push_failure("boom");

        let turns = [ChatTurn::user("hi")];
        assert_eq!(engine.complete(&turns).await.unwrap(), "first");
        assert!(engine.complete(&turns).await.is_err());
        assert_eq!(engine.complete(&turns).await.unwrap(), "fallback");
        assert_eq!(engine.calls(), 3);
        assert_eq!(engine.prompts()[0], turns.to_vec());
    }

    #[tokio::test]
    async fn mini_without_script_errors() {
        let engine = ScriptedEngine::new();
        assert!(engine.complete_mini(&[ChatTurn::user("x")]).await.is_err());
        assert_eq!(engine.mini_calls(), 1);
    }
}
