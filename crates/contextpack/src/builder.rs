//! System-prompt assembly and prompt history shaping.
//!
//! [`PromptBuilder`] renders the five layers in a fixed order and joins them
//! with blank lines. [`prompt_turns`] folds stored messages into chat turns,
//! and [`pending_burst`] picks out the user messages still awaiting a reply.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use kd_domain::chat::{ChatTurn, Role};
use kd_domain::companion::CompanionProfile;
use kd_domain::context::ConversationContext;
use kd_domain::conversation::{Message, SenderType};
use kd_domain::emotion::EmotionalState;

use crate::layers::{self, Layer};
use crate::report::{ContextReport, LayerReport};

/// Separator between layers.
const LAYER_SEPARATOR: &str = "\n\n";

/// Everything a prompt build reads.
pub struct PromptInput<'a> {
    pub context: &'a ConversationContext,
    pub profile: &'a CompanionProfile,
    pub emotion: &'a EmotionalState,
    /// User messages answered by this turn.
    pub burst_len: usize,
    pub now: DateTime<Utc>,
}

/// Deterministic layered prompt builder.
///
/// Pure function: accepts a context snapshot, the companion profile and the
/// detected emotion, returns the assembled system prompt plus a report.
pub struct PromptBuilder {
    pub recent_memories: usize,
    pub timezone: Tz,
}

impl PromptBuilder {
    pub fn new(recent_memories: usize, timezone: Tz) -> Self {
        Self {
            recent_memories,
            timezone,
        }
    }

    pub fn build(&self, input: &PromptInput<'_>) -> (String, ContextReport) {
        let ctx = input.context;
        let memories = ctx.recent_memories(self.recent_memories);
        let local = input.now.with_timezone(&self.timezone);
        let topics_included =
            ctx.current_topic.iter().count() + ctx.recent_topics(layers::RECENT_TOPICS).len();

        let mut sections = Vec::with_capacity(Layer::ORDER.len());
        let mut reports = Vec::with_capacity(Layer::ORDER.len());

        for layer in Layer::ORDER {
            let body = match layer {
                Layer::Identity => layers::identity(input.profile),
                Layer::Relationship => layers::relationship(ctx, &memories),
                Layer::Conversation => layers::conversation(ctx, input.burst_len),
                Layer::Situational => layers::situational(&local, input.emotion),
                Layer::Style => layers::style(
                    input.emotion,
                    ctx.companion_reaction,
                    ctx.intimacy_level,
                    input.profile.speaking_style.as_deref(),
                ),
            };
            let section = layers::format_layer(layer, &body);
            reports.push(LayerReport {
                layer,
                chars: section.chars().count(),
            });
            sections.push(section);
        }

        let assembled = sections.join(LAYER_SEPARATOR);
        let report = ContextReport {
            layers: reports,
            total_chars: assembled.chars().count(),
            memories_included: memories.len(),
            topics_included,
            emotion: input.emotion.primary.clone(),
            reaction: ctx.companion_reaction.as_str().to_string(),
        };
        (assembled, report)
    }
}

/// Turn stored history into role-tagged prompt turns, system prompt first.
///
/// Consecutive messages from the same side are merged into one turn so the
/// chunks of a multi-bubble reply read as a single assistant message. System
/// events are dropped.
pub fn prompt_turns(system_prompt: String, history: &[Message]) -> Vec<ChatTurn> {
    let mut turns = vec![ChatTurn::system(system_prompt)];
    for msg in history {
        let role = match msg.sender {
            SenderType::User => Role::User,
            SenderType::Companion => Role::Assistant,
            SenderType::System => continue,
        };
        let Some(text) = msg.content.prompt_text() else {
            continue;
        };
        match turns.last_mut() {
            Some(last) if last.role == role => {
                let sep = if role == Role::Assistant { " " } else { "\n" };
                last.text.push_str(sep);
                last.text.push_str(&text);
            }
            _ => turns.push(ChatTurn { role, text }),
        }
    }
    turns
}

/// User messages the companion has not answered yet, oldest first.
///
/// A message counts as answered once a generation that included it has
/// stored at least one reply chunk and marked it read, so messages that
/// arrived while a previous reply was still being typed stay pending.
pub fn pending_burst(history: &[Message]) -> Vec<&Message> {
    history
        .iter()
        .filter(|m| m.sender == SenderType::User && !m.read)
        .collect()
}
