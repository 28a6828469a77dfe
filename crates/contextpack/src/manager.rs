//! Stateful side of the context builder: loads and persists
//! `ConversationContext`, runs the classifiers and folds their results in.

use std::sync::Arc;

use chrono::Utc;

use kd_domain::companion::CompanionProfile;
use kd_domain::config::ContextConfig;
use kd_domain::context::{ConversationContext, EmotionalSnapshot, RelationshipStage};
use kd_domain::conversation::Message;
use kd_domain::emotion::{CompanionReaction, EmotionalState, Valence};
use kd_domain::error::Result;
use kd_domain::trace::TraceEvent;
use kd_providers::CompletionEngine;
use kd_store::ConversationStore;

use crate::builder::{PromptBuilder, PromptInput};
use crate::report::ContextReport;
use crate::{emotion, extraction};

pub struct ContextManager {
    store: Arc<dyn ConversationStore>,
    engine: Arc<dyn CompletionEngine>,
    cfg: ContextConfig,
    builder: PromptBuilder,
}

impl ContextManager {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        engine: Arc<dyn CompletionEngine>,
        cfg: ContextConfig,
    ) -> Self {
        let builder = PromptBuilder::new(cfg.recent_memories_in_prompt, cfg.tz());
        Self {
            store,
            engine,
            cfg,
            builder,
        }
    }

    pub async fn get_or_create_context(&self, conversation_id: &str) -> Result<ConversationContext> {
        self.store.get_or_create_context(conversation_id).await
    }

    /// Classify the user's latest burst. Falls back to neutral on any
    /// failure so the turn always proceeds.
    pub async fn analyze_emotion(&self, conversation_id: &str, text: &str) -> EmotionalState {
        let analysis = emotion::analyze(self.engine.as_ref(), text).await;
        TraceEvent::EmotionAnalyzed {
            conversation_id: conversation_id.to_owned(),
            primary: analysis.state.primary.clone(),
            intensity: analysis.state.intensity,
            fallback: analysis.fallback,
        }
        .emit();
        analysis.state
    }

    /// Append an emotional snapshot (bounded history) and set the
    /// companion's reaction.
    pub async fn update_emotional_context(
        &self,
        conversation_id: &str,
        emotion: &EmotionalState,
        message_id: &str,
    ) -> Result<ConversationContext> {
        let snapshot = EmotionalSnapshot {
            message_id: message_id.to_owned(),
            user: emotion.clone(),
            reaction: CompanionReaction::for_state(emotion),
            recorded_at: Utc::now(),
        };
        let max = self.cfg.max_emotional_history;
        self.store
            .update_context(
                conversation_id,
                Box::new(move |ctx| ctx.push_emotion(snapshot, max)),
            )
            .await
    }

    /// Assemble the layered system prompt for the current moment.
    pub fn build_prompt(
        &self,
        context: &ConversationContext,
        profile: &CompanionProfile,
        emotion: &EmotionalState,
        burst_len: usize,
    ) -> (String, ContextReport) {
        let (prompt, report) = self.builder.build(&PromptInput {
            context,
            profile,
            emotion,
            burst_len,
            now: Utc::now(),
        });
        TraceEvent::ContextBuilt {
            conversation_id: context.conversation_id.clone(),
            total_chars: report.total_chars,
            layers: report.layers.len(),
            memories_included: report.memories_included,
        }
        .emit();
        (prompt, report)
    }

    /// Bookkeeping after a delivered reply: turn counter and relationship
    /// progression.
    pub async fn record_turn(
        &self,
        conversation_id: &str,
        emotion: &EmotionalState,
    ) -> Result<ConversationContext> {
        let valence = emotion.valence();
        self.store
            .update_context(
                conversation_id,
                Box::new(move |ctx| {
                    ctx.turn_count += 1;
                    progress_relationship(ctx, valence);
                }),
            )
            .await
    }

    /// Extract durable memories from `messages`, persist them to the memory
    /// log and fold them into the bounded context list. Returns how many new
    /// entries the context kept.
    pub async fn extract_and_store_memory(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<usize> {
        let extracted = extraction::extract_memories(self.engine.as_ref(), messages).await?;
        if extracted.is_empty() {
            TraceEvent::MemoriesExtracted {
                conversation_id: conversation_id.to_owned(),
                extracted: 0,
                retained: 0,
            }
            .emit();
            return Ok(0);
        }

        self.store.append_memories(conversation_id, &extracted).await?;

        let count = extracted.len();
        let ids: Vec<String> = extracted.iter().map(|m| m.id.clone()).collect();
        let max = self.cfg.max_memories;
        let policy = self.cfg.memory_eviction;
        let ctx = self
            .store
            .update_context(
                conversation_id,
                Box::new(move |ctx| {
                    ctx.fold_memories(extracted, max, policy);
                }),
            )
            .await?;
        let kept = ctx.memories.iter().filter(|m| ids.contains(&m.id)).count();

        TraceEvent::MemoriesExtracted {
            conversation_id: conversation_id.to_owned(),
            extracted: count,
            retained: ctx.memories.len(),
        }
        .emit();
        Ok(kept)
    }

    /// Re-detect the conversation topic and rotate the topic history.
    pub async fn refresh_intelligence(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<Option<String>> {
        let Some(topic) = extraction::detect_topic(self.engine.as_ref(), messages).await? else {
            return Ok(None);
        };
        let max = self.cfg.max_topic_history;
        let t = topic.clone();
        self.store
            .update_context(conversation_id, Box::new(move |ctx| ctx.set_topic(t, max)))
            .await?;
        tracing::debug!(conversation_id, topic = %topic, "conversation topic refreshed");
        Ok(Some(topic))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Relationship progression
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-turn (trust, intimacy) increments by the user's emotional valence.
fn relationship_step(valence: Valence) -> (f32, f32) {
    match valence {
        Valence::Positive => (0.03, 0.02),
        Valence::Neutral => (0.02, 0.01),
        Valence::Agitated | Valence::Negative => (0.01, 0.005),
    }
}

/// Nudge trust and intimacy upward and derive the stage. Stages never move
/// backwards.
pub fn progress_relationship(ctx: &mut ConversationContext, valence: Valence) {
    let (dt, di) = relationship_step(valence);
    ctx.trust_level = (ctx.trust_level + dt).clamp(0.0, 1.0);
    ctx.intimacy_level = (ctx.intimacy_level + di).clamp(0.0, 1.0);
    let stage = RelationshipStage::for_intimacy(ctx.intimacy_level);
    if stage > ctx.relationship_stage {
        tracing::info!(
            conversation_id = %ctx.conversation_id,
            from = ctx.relationship_stage.as_str(),
            to = stage.as_str(),
            "relationship stage advanced"
        );
        ctx.relationship_stage = stage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_turns_advance_stage() {
        let mut ctx = ConversationContext::new("c");
        for _ in 0..6 {
            progress_relationship(&mut ctx, Valence::Positive);
        }
        // 0.3 + 6 * 0.02
        assert!((ctx.intimacy_level - 0.42).abs() < 1e-4);
        assert_eq!(ctx.relationship_stage, RelationshipStage::Acquaintance);
    }

    #[test]
    fn levels_are_clamped() {
        let mut ctx = ConversationContext::new("c");
        ctx.trust_level = 0.995;
        ctx.intimacy_level = 0.999;
        progress_relationship(&mut ctx, Valence::Positive);
        assert!((ctx.trust_level - 1.0).abs() < f32::EPSILON);
        assert!((ctx.intimacy_level - 1.0).abs() < f32::EPSILON);
        assert_eq!(ctx.relationship_stage, RelationshipStage::CloseFriend);
    }

    #[test]
    fn negative_turns_grow_slower() {
        let mut pos = ConversationContext::new("a");
        let mut neg = ConversationContext::new("b");
        progress_relationship(&mut pos, Valence::Positive);
        progress_relationship(&mut neg, Valence::Negative);
        assert!(pos.trust_level > neg.trust_level);
        assert!(pos.intimacy_level > neg.intimacy_level);
    }
}
