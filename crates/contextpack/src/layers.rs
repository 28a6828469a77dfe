//! The five prompt layers. Each is a pure function of its inputs and is
//! wrapped in a delimited section so assembled prompts stay inspectable.

use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use kd_domain::companion::CompanionProfile;
use kd_domain::context::{ConversationContext, MemoryEntry, RelationshipStage};
use kd_domain::emotion::{CompanionReaction, EmotionalState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Identity,
    Relationship,
    Conversation,
    Situational,
    Style,
}

impl Layer {
    /// Emission order of the assembled prompt.
    pub const ORDER: [Layer; 5] = [
        Layer::Identity,
        Layer::Relationship,
        Layer::Conversation,
        Layer::Situational,
        Layer::Style,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Layer::Identity => "IDENTITY",
            Layer::Relationship => "RELATIONSHIP",
            Layer::Conversation => "CONVERSATION",
            Layer::Situational => "SITUATIONAL",
            Layer::Style => "STYLE",
        }
    }
}

/// Wrap a layer body in its delimiter.
pub fn format_layer(layer: Layer, body: &str) -> String {
    format!("=== {} ===\n{}", layer.label(), body.trim_end())
}

// ── identity ────────────────────────────────────────────────────────

pub fn identity(profile: &CompanionProfile) -> String {
    let mut out = format!("You are {}, a companion in an ongoing private chat.\n", profile.name);
    if !profile.personality.trim().is_empty() {
        out.push_str(&format!("Personality: {}\n", profile.personality.trim()));
    }
    if !profile.backstory.trim().is_empty() {
        out.push_str(&format!("Backstory: {}\n", profile.backstory.trim()));
    }
    if !profile.interests.is_empty() {
        out.push_str(&format!("Interests: {}\n", profile.interests.join(", ")));
    }
    out.push_str("Stay in character. Speak as yourself, never as an assistant describing itself.");
    out
}

// ── relationship ────────────────────────────────────────────────────

pub fn relationship(ctx: &ConversationContext, memories: &[&MemoryEntry]) -> String {
    let mut out = format!(
        "Stage: {}\nTrust: {:.2}\nIntimacy: {:.2}\n",
        ctx.relationship_stage.as_str(),
        ctx.trust_level,
        ctx.intimacy_level,
    );
    if memories.is_empty() {
        out.push_str("Things you remember: nothing yet.\n");
    } else {
        out.push_str("Things you remember:\n");
        for m in memories {
            out.push_str(&format!("- {}\n", m.content.trim()));
        }
    }
    out.push_str("Guidelines: ");
    out.push_str(stage_guideline(ctx.relationship_stage));
    out
}

fn stage_guideline(stage: RelationshipStage) -> &'static str {
    match stage {
        RelationshipStage::GettingToKnow => {
            "You are still getting to know each other. Be curious, ask light questions, do not presume familiarity."
        }
        RelationshipStage::Acquaintance => {
            "You know a few things about each other. Refer back to what you remember when it fits."
        }
        RelationshipStage::Friend => {
            "You are friends. Be relaxed and open, share your own opinions and small stories."
        }
        RelationshipStage::CloseFriend => {
            "You are close. Be warm and personal, check in on things that matter to them."
        }
    }
}

// ── conversation ────────────────────────────────────────────────────

/// Number of previous topics mentioned in the conversation layer.
pub const RECENT_TOPICS: usize = 3;

pub fn conversation(ctx: &ConversationContext, burst_len: usize) -> String {
    let mut out = match &ctx.current_topic {
        Some(topic) => format!("Current topic: {topic}\n"),
        None => "Current topic: none yet\n".to_string(),
    };
    let recent = ctx.recent_topics(RECENT_TOPICS);
    if !recent.is_empty() {
        out.push_str(&format!("Earlier topics: {}\n", recent.join("; ")));
    }
    out.push_str(&format!("Turns so far: {}\n", ctx.turn_count));
    out.push_str("Pacing: ");
    if burst_len > 1 {
        out.push_str(&format!(
            "they sent {burst_len} messages in a row. Answer them together in one natural reply."
        ));
    } else if ctx.turn_count == 0 {
        out.push_str("this is the start of the conversation. Keep the opening easy.");
    } else {
        out.push_str("keep the flow going at a natural pace.");
    }
    out
}

// ── situational ─────────────────────────────────────────────────────

/// `local` is the current time already converted to the configured zone.
pub fn situational<T: Timelike + Datelike>(local: &T, emotion: &EmotionalState) -> String {
    let mut out = format!(
        "Local time: {} {:02}:{:02} ({})\n",
        weekday_name(local.weekday()),
        local.hour(),
        local.minute(),
        part_of_day(local.hour()),
    );
    out.push_str(&format!(
        "Their mood: {} (intensity {:.1}",
        emotion.primary, emotion.intensity
    ));
    if let Some(secondary) = &emotion.secondary {
        out.push_str(&format!(", with some {secondary}"));
    }
    out.push_str(")\n");
    if !emotion.triggers.is_empty() {
        out.push_str(&format!("Triggered by: {}\n", emotion.triggers.join(", ")));
    }
    out
}

pub fn part_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

// ── style ───────────────────────────────────────────────────────────

pub fn style(
    emotion: &EmotionalState,
    reaction: CompanionReaction,
    intimacy: f32,
    speaking_style: Option<&str>,
) -> String {
    let length = if emotion.intensity >= 0.7 {
        "short and focused, one to three sentences"
    } else if emotion.intensity <= 0.3 {
        "relaxed, two to four sentences"
    } else {
        "moderate, two or three sentences"
    };
    let tone = if intimacy >= 0.6 {
        "warm and familiar; gentle teasing is fine"
    } else if intimacy >= 0.4 {
        "friendly and open"
    } else {
        "friendly but a little reserved"
    };
    let lead = match reaction {
        CompanionReaction::Empathy => "Acknowledge how they feel before anything else.",
        CompanionReaction::SharedJoy => "Share their excitement genuinely.",
        CompanionReaction::Calm => "Stay steady and reassuring; slow things down.",
        CompanionReaction::Neutral => "Match their energy.",
    };

    let mut out = format!("Length: {length}\nTone: {tone}\n{lead}\n");
    if let Some(s) = speaking_style.filter(|s| !s.trim().is_empty()) {
        out.push_str(&format!("Voice: {}\n", s.trim()));
    }
    out.push_str("Write like a text message: no lists, no headings.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_of_day_boundaries() {
        assert_eq!(part_of_day(4), "night");
        assert_eq!(part_of_day(5), "morning");
        assert_eq!(part_of_day(12), "afternoon");
        assert_eq!(part_of_day(17), "evening");
        assert_eq!(part_of_day(21), "night");
    }

    #[test]
    fn conversation_layer_mentions_burst() {
        let ctx = ConversationContext::new("c");
        let text = conversation(&ctx, 3);
        assert!(text.contains("3 messages in a row"));
        assert!(text.contains("Current topic: none yet"));
    }

    #[test]
    fn conversation_layer_lists_last_three_topics() {
        let mut ctx = ConversationContext::new("c");
        for t in ["a", "b", "c", "d", "e"] {
            ctx.set_topic(t, 10);
        }
        let text = conversation(&ctx, 1);
        assert!(text.contains("Current topic: e"));
        assert!(text.contains("Earlier topics: d; c; b"));
        assert!(!text.contains("; a"));
    }

    #[test]
    fn intense_emotion_shortens_style() {
        let mut emotion = EmotionalState::neutral();
        emotion.intensity = 0.9;
        let text = style(&emotion, CompanionReaction::Calm, 0.3, None);
        assert!(text.contains("short and focused"));
        assert!(text.contains("reserved"));
        assert!(text.contains("reassuring"));
    }
}
