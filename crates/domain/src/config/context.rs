use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation context bounds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "d_10")]
    pub max_emotional_history: usize,
    #[serde(default = "d_20")]
    pub max_memories: usize,
    #[serde(default = "d_10")]
    pub max_topic_history: usize,
    #[serde(default)]
    pub memory_eviction: MemoryEviction,
    /// How many memories the relationship layer mentions.
    #[serde(default = "d_5")]
    pub recent_memories_in_prompt: usize,
    /// IANA timezone used for the situational layer's time of day.
    #[serde(default = "d_timezone")]
    pub timezone: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_emotional_history: 10,
            max_memories: 20,
            max_topic_history: 10,
            memory_eviction: MemoryEviction::Importance,
            recent_memories_in_prompt: 5,
            timezone: d_timezone(),
        }
    }
}

impl ContextConfig {
    /// Parse `timezone`, falling back to UTC for unknown names.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

/// Which memory goes when the bounded list overflows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryEviction {
    /// Oldest entry first, regardless of importance.
    Recency,
    /// Least important entry first; ties go to the oldest.
    #[default]
    Importance,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_5() -> usize {
    5
}
fn d_10() -> usize {
    10
}
fn d_20() -> usize {
    20
}
fn d_timezone() -> String {
    "UTC".into()
}
