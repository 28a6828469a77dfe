//! Per-conversation layered prompt material.
//!
//! One [`ConversationContext`] exists per conversation. It is created lazily
//! on the first reply generation and mutated after every turn. All lists are
//! bounded; the bounds are passed in from configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MemoryEviction;
use crate::emotion::{CompanionReaction, EmotionalState};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Relationship
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStage {
    #[default]
    GettingToKnow,
    Acquaintance,
    Friend,
    CloseFriend,
}

impl RelationshipStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GettingToKnow => "getting_to_know",
            Self::Acquaintance => "acquaintance",
            Self::Friend => "friend",
            Self::CloseFriend => "close_friend",
        }
    }

    /// Stage implied by an intimacy level.
    pub fn for_intimacy(intimacy: f32) -> Self {
        if intimacy >= 0.8 {
            Self::CloseFriend
        } else if intimacy >= 0.6 {
            Self::Friend
        } else if intimacy >= 0.4 {
            Self::Acquaintance
        } else {
            Self::GettingToKnow
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memories & emotional snapshots
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Fact,
    Preference,
    Milestone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub kind: MemoryKind,
    pub content: String,
    /// 0.0 – 1.0
    pub importance: f32,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(kind: MemoryKind, content: impl Into<String>, importance: f32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            content: content.into(),
            importance: importance.clamp(0.0, 1.0),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalSnapshot {
    pub message_id: String,
    pub user: EmotionalState,
    pub reaction: CompanionReaction,
    pub recorded_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ConversationContext
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub relationship_stage: RelationshipStage,
    /// 0.0 – 1.0
    pub trust_level: f32,
    /// 0.0 – 1.0
    pub intimacy_level: f32,
    #[serde(default)]
    pub current_topic: Option<String>,
    /// Oldest first.
    #[serde(default)]
    pub topic_history: Vec<String>,
    /// Oldest first.
    #[serde(default)]
    pub memories: Vec<MemoryEntry>,
    /// Oldest first.
    #[serde(default)]
    pub emotional_history: Vec<EmotionalSnapshot>,
    #[serde(default = "d_reaction")]
    pub companion_reaction: CompanionReaction,
    #[serde(default)]
    pub turn_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn d_reaction() -> CompanionReaction {
    CompanionReaction::Neutral
}

impl ConversationContext {
    /// Fresh context with the default relationship scalars.
    pub fn new(conversation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            relationship_stage: RelationshipStage::GettingToKnow,
            trust_level: 0.5,
            intimacy_level: 0.3,
            current_topic: None,
            topic_history: Vec::new(),
            memories: Vec::new(),
            emotional_history: Vec::new(),
            companion_reaction: CompanionReaction::Neutral,
            turn_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a snapshot and keep only the most recent `max` (FIFO).
    pub fn push_emotion(&mut self, snapshot: EmotionalSnapshot, max: usize) {
        self.companion_reaction = snapshot.reaction;
        self.emotional_history.push(snapshot);
        if self.emotional_history.len() > max {
            let excess = self.emotional_history.len() - max;
            self.emotional_history.drain(..excess);
        }
        self.touch();
    }

    pub fn latest_emotion(&self) -> Option<&EmotionalSnapshot> {
        self.emotional_history.last()
    }

    /// Switch to `topic`, moving the previous topic into the bounded history.
    /// Re-announcing the current topic is a no-op.
    pub fn set_topic(&mut self, topic: impl Into<String>, max_history: usize) {
        let topic = topic.into();
        let topic = topic.trim();
        if topic.is_empty() {
            return;
        }
        if let Some(current) = &self.current_topic {
            if current.eq_ignore_ascii_case(topic) {
                return;
            }
            self.topic_history.push(current.clone());
        }
        if self.topic_history.len() > max_history {
            let excess = self.topic_history.len() - max_history;
            self.topic_history.drain(..excess);
        }
        self.current_topic = Some(topic.to_string());
        self.touch();
    }

    /// Most recent `n` previous topics, newest first.
    pub fn recent_topics(&self, n: usize) -> Vec<&str> {
        self.topic_history.iter().rev().take(n).map(String::as_str).collect()
    }

    /// Fold new entries into the bounded memory list. Entries whose content
    /// already exists (case-insensitive) are skipped. Returns how many were
    /// added.
    pub fn fold_memories(
        &mut self,
        entries: Vec<MemoryEntry>,
        max: usize,
        policy: MemoryEviction,
    ) -> usize {
        let mut added = 0;
        for entry in entries {
            let duplicate = self
                .memories
                .iter()
                .any(|m| m.content.trim().eq_ignore_ascii_case(entry.content.trim()));
            if duplicate || entry.content.trim().is_empty() {
                continue;
            }
            self.memories.push(entry);
            added += 1;
        }
        while self.memories.len() > max {
            let victim = match policy {
                MemoryEviction::Recency => 0,
                MemoryEviction::Importance => self.least_important_index(),
            };
            self.memories.remove(victim);
        }
        if added > 0 {
            self.touch();
        }
        added
    }

    /// Index of the least important memory; ties go to the oldest.
    fn least_important_index(&self) -> usize {
        let mut victim = 0;
        for (i, m) in self.memories.iter().enumerate() {
            if m.importance < self.memories[victim].importance {
                victim = i;
            }
        }
        victim
    }

    /// Most recent `n` memories, newest first.
    pub fn recent_memories(&self, n: usize) -> Vec<&MemoryEntry> {
        self.memories.iter().rev().take(n).collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
