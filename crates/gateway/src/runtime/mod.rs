//! Core runtime: the turn orchestrator that ties aggregation, the generation
//! guard, context building, the completion engine and paced delivery into
//! one per-conversation state machine.
//!
//! ```text
//! Idle ──user msg──▶ Aggregating ──timer + guard──▶ Generating ──done──▶ Idle
//!                      │  ▲                          │
//!                      └──┘ more user msgs           └─ guard busy: skip or rerun
//! ```
//!
//! Entry points: [`TurnOrchestrator::submit_user_message`] and
//! [`TurnOrchestrator::poll_typing_status`].

pub mod aggregation;
pub mod background;
pub mod delivery;
pub mod guard;
pub mod typing;

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::Instrument;

use kd_contextpack::{pending_burst, prompt_turns, ContextManager};
use kd_domain::companion::CompanionProfile;
use kd_domain::config::{BusyPolicy, Config, OrchestratorConfig};
use kd_domain::conversation::{Message, MessageContent, NewMessage};
use kd_domain::error::{Error, Result};
use kd_domain::trace::TraceEvent;
use kd_providers::CompletionEngine;
use kd_store::ConversationStore;

use self::aggregation::{AggregationScheduler, FireFn};
use self::background::{BackgroundPool, JobKind};
use self::delivery::ResponseDelivery;
use self::guard::{Acquire, GenerationGuard};
use self::typing::TypingTracker;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typing status (poll response)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where a [`TypingStatus`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingSource {
    /// The in-process tracker.
    Live,
    /// Reconstructed from the latest stored companion message.
    Stored,
    /// Nothing known.
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypingStatus {
    pub is_typing: bool,
    pub chunk_index: usize,
    pub chunk_total: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub source: TypingSource,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TurnOrchestrator {
    cfg: OrchestratorConfig,
    store: Arc<dyn ConversationStore>,
    engine: Arc<dyn CompletionEngine>,
    context: Arc<ContextManager>,
    typing: Arc<TypingTracker>,
    guard: Arc<GenerationGuard>,
    scheduler: AggregationScheduler,
    delivery: ResponseDelivery,
    background: BackgroundPool,
}

impl TurnOrchestrator {
    pub fn new(
        config: &Config,
        store: Arc<dyn ConversationStore>,
        engine: Arc<dyn CompletionEngine>,
    ) -> Arc<Self> {
        Self::build(config, store, engine, None)
    }

    /// Same as [`TurnOrchestrator::new`] with a fixed delivery jitter seed.
    pub fn with_seed(
        config: &Config,
        store: Arc<dyn ConversationStore>,
        engine: Arc<dyn CompletionEngine>,
        seed: u64,
    ) -> Arc<Self> {
        Self::build(config, store, engine, Some(seed))
    }

    fn build(
        config: &Config,
        store: Arc<dyn ConversationStore>,
        engine: Arc<dyn CompletionEngine>,
        seed: Option<u64>,
    ) -> Arc<Self> {
        let typing = Arc::new(TypingTracker::new(config.orchestrator.typing_idle_ttl()));
        let context = Arc::new(ContextManager::new(
            store.clone(),
            engine.clone(),
            config.context.clone(),
        ));
        let delivery = match seed {
            Some(seed) => ResponseDelivery::seeded(
                config.delivery.clone(),
                store.clone(),
                typing.clone(),
                seed,
            ),
            None => ResponseDelivery::new(config.delivery.clone(), store.clone(), typing.clone()),
        };

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let on_fire: FireFn = Arc::new(move |conversation_id: String| {
                if let Some(this) = weak.upgrade() {
                    this.spawn_generation(conversation_id);
                }
            });

            Self {
                cfg: config.orchestrator.clone(),
                store,
                engine,
                context,
                typing,
                guard: Arc::new(GenerationGuard::new()),
                scheduler: AggregationScheduler::new(&config.orchestrator, on_fire),
                delivery,
                background: BackgroundPool::new(config.background.workers),
            }
        })
    }

    // ── accessors ───────────────────────────────────────────────────

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    pub fn guard(&self) -> &GenerationGuard {
        &self.guard
    }

    pub fn scheduler(&self) -> &AggregationScheduler {
        &self.scheduler
    }

    pub fn background(&self) -> &BackgroundPool {
        &self.background
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn engine_id(&self) -> &str {
        self.engine.provider_id()
    }

    // ── client-facing operations ────────────────────────────────────

    /// Validate and persist a user message, then open or extend the
    /// aggregation window. Returns as soon as the message is stored; the
    /// reply is generated later.
    pub async fn submit_user_message(
        &self,
        conversation_id: &str,
        content: MessageContent,
    ) -> Result<Message> {
        content.validate()?;
        let conv = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;
        if conv.archived {
            return Err(Error::Validation(format!(
                "conversation {conversation_id} is archived"
            )));
        }

        let message = self
            .store
            .append_message(NewMessage::user(conversation_id, content))
            .await?;
        let scheduled = self.scheduler.on_user_message(conversation_id);
        tracing::debug!(
            conversation_id,
            message_id = %message.id,
            delay_ms = scheduled.delay.as_millis() as u64,
            capped = scheduled.capped,
            "user message accepted"
        );
        Ok(message)
    }

    /// Live typing state, or a best-effort reconstruction from the latest
    /// stored companion message (e.g. after a restart).
    pub async fn poll_typing_status(&self, conversation_id: &str) -> Result<TypingStatus> {
        if let Some(state) = self.typing.get(conversation_id) {
            return Ok(TypingStatus {
                is_typing: state.is_typing,
                chunk_index: state.chunk_index,
                chunk_total: state.chunk_total,
                last_update: Some(state.last_update),
                source: TypingSource::Live,
            });
        }

        if self.store.get_conversation(conversation_id).await?.is_none() {
            return Err(Error::NotFound(format!("conversation {conversation_id}")));
        }

        let latest = self.store.latest_companion_message(conversation_id).await?;
        Ok(stored_status(latest.as_ref(), Utc::now(), self.delivery.max_gap()))
    }

    // ── generation ──────────────────────────────────────────────────

    fn spawn_generation(self: Arc<Self>, conversation_id: String) {
        let span = tracing::info_span!("generation", conversation_id = %conversation_id);
        tokio::spawn(
            async move {
                self.run_generation(&conversation_id).await;
            }
            .instrument(span),
        );
    }

    /// One pass of `Generating`: guard, generate, release. Never fails;
    /// errors are logged and the conversation goes back to idle.
    pub async fn run_generation(&self, conversation_id: &str) {
        let queue_rerun = self.cfg.busy_policy == BusyPolicy::RerunAfter;
        let permit = match self.guard.acquire(conversation_id, queue_rerun) {
            Acquire::Acquired(permit) => permit,
            Acquire::Busy { rerun_queued } => {
                tracing::debug!(conversation_id, rerun_queued, "generation already in flight");
                TraceEvent::GenerationSkipped {
                    conversation_id: conversation_id.to_owned(),
                    rerun_queued,
                }
                .emit();
                return;
            }
        };

        let started = Instant::now();
        let outcome = self.generate(conversation_id).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (chunks, ok) = match outcome {
            Ok(chunks) => (chunks, true),
            Err(e) => {
                tracing::warn!(
                    conversation_id,
                    error = %e,
                    transient = e.is_transient(),
                    "generation failed, burst left unanswered"
                );
                self.typing.clear(conversation_id);
                (0, false)
            }
        };
        TraceEvent::GenerationFinished {
            conversation_id: conversation_id.to_owned(),
            chunks,
            duration_ms,
            ok,
        }
        .emit();

        if permit.release() {
            tracing::debug!(conversation_id, "rerun requested while busy, reopening window");
            self.scheduler.on_user_message(conversation_id);
        }
    }

    /// Answer the pending burst. Returns the number of chunks delivered
    /// (zero when there was nothing to answer).
    async fn generate(&self, conversation_id: &str) -> Result<usize> {
        self.typing.set_start(conversation_id);

        let conv = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;
        let profile = match self.store.get_companion_profile(&conv.companion_id).await? {
            Some(p) => p,
            None => {
                tracing::debug!(companion_id = %conv.companion_id, "unknown companion, using placeholder");
                CompanionProfile::placeholder(&conv.companion_id)
            }
        };
        let history = self
            .store
            .list_recent_messages(conversation_id, self.cfg.history_limit)
            .await?;

        let burst = pending_burst(&history);
        let Some(last) = burst.last() else {
            tracing::debug!(conversation_id, "no unanswered messages");
            self.typing.clear(conversation_id);
            return Ok(0);
        };
        let last_id = last.id.clone();
        let burst_ids: Vec<String> = burst.iter().map(|m| m.id.clone()).collect();
        let burst_text = burst
            .iter()
            .filter_map(|m| m.content.prompt_text())
            .collect::<Vec<_>>()
            .join("\n");

        // 1. Read the user's mood and fold it into the context.
        let emotion = self.context.analyze_emotion(conversation_id, &burst_text).await;
        let ctx = self
            .context
            .update_emotional_context(conversation_id, &emotion, &last_id)
            .await?;

        // 2. Assemble the prompt.
        let (system_prompt, _report) =
            self.context
                .build_prompt(&ctx, &profile, &emotion, burst_ids.len());
        let turns = prompt_turns(system_prompt, &history);

        TraceEvent::GenerationStarted {
            conversation_id: conversation_id.to_owned(),
            history_len: history.len(),
        }
        .emit();

        // 3. Complete, bounded.
        let reply = tokio::time::timeout(self.cfg.completion_timeout(), self.engine.complete(&turns))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "completion exceeded {}ms",
                    self.cfg.completion_timeout_ms
                ))
            })??;

        if reply.trim().is_empty() {
            return Err(Error::Provider {
                provider: self.engine.provider_id().to_owned(),
                message: "completion was empty".into(),
            });
        }

        // 4. Deliver in chunks.
        let delivery = self
            .delivery
            .deliver(conversation_id, &reply, &profile.traits)
            .await;
        if delivery.messages.is_empty() {
            return Err(delivery
                .error
                .unwrap_or_else(|| Error::Other("reply produced no chunks".into())));
        }

        // Any stored chunk means the user has seen an answer.
        for id in &burst_ids {
            if let Err(e) = self.store.mark_read(id).await {
                tracing::warn!(message_id = %id, error = %e, "failed to mark message answered");
            }
        }
        self.context.record_turn(conversation_id, &emotion).await?;

        if let Some(e) = &delivery.error {
            tracing::warn!(
                conversation_id,
                stored = delivery.messages.len(),
                planned = delivery.planned,
                error = %e,
                "reply delivery interrupted, keeping the partial answer"
            );
        }
        let delivered = delivery.messages;

        // 5. Post-processing off the reply path.
        let mut transcript = history;
        transcript.extend(delivered.iter().cloned());
        self.enqueue_post_processing(conversation_id, transcript);

        Ok(delivered.len())
    }

    fn enqueue_post_processing(&self, conversation_id: &str, transcript: Vec<Message>) {
        let transcript = Arc::new(transcript);

        let context = self.context.clone();
        let id = conversation_id.to_owned();
        let messages = transcript.clone();
        self.background
            .submit(conversation_id, JobKind::MemoryExtraction, async move {
                context.extract_and_store_memory(&id, &messages).await.map(|_| ())
            });

        let context = self.context.clone();
        let id = conversation_id.to_owned();
        self.background
            .submit(conversation_id, JobKind::IntelligenceRefresh, async move {
                context.refresh_intelligence(&id, &transcript).await.map(|_| ())
            });
    }
}

/// Typing status reconstructed from the latest stored companion chunk.
///
/// A non-final chunk older than the longest pause between chunks belongs to
/// a reply that will never be finished, so it does not count as typing.
fn stored_status(
    latest: Option<&Message>,
    now: DateTime<Utc>,
    max_gap: std::time::Duration,
) -> TypingStatus {
    let Some(m) = latest else {
        return TypingStatus {
            is_typing: false,
            chunk_index: 0,
            chunk_total: 0,
            last_update: None,
            source: TypingSource::None,
        };
    };
    let stale = chrono::Duration::from_std(max_gap)
        .map(|gap| now - m.created_at > gap)
        .unwrap_or(false);
    TypingStatus {
        is_typing: m.is_typing && !stale,
        chunk_index: m.chunk_index,
        chunk_total: m.chunk_total,
        last_update: Some(m.created_at),
        source: TypingSource::Stored,
    }
}
