//! Memory extraction and topic detection over a batch of turns. Both run on
//! the mini model from background jobs.

use serde::Deserialize;

use kd_domain::chat::ChatTurn;
use kd_domain::context::{MemoryEntry, MemoryKind};
use kd_domain::conversation::{Message, SenderType};
use kd_domain::error::{Error, Result};
use kd_providers::CompletionEngine;

use crate::json;

const MEMORY_PROMPT: &str = "\
Read the chat transcript and list durable things worth remembering about the \
user: facts about their life, stated preferences, and emotional milestones.
Skip small talk and anything only true for this moment.
Respond with a single JSON object and nothing else:
{\"memories\": [{\"kind\": \"fact\" | \"preference\" | \"milestone\", \
\"content\": short third-person sentence, \"importance\": number 0-1}]}
Return {\"memories\": []} when there is nothing new.";

const TOPIC_PROMPT: &str = "\
Name the topic of the most recent part of this chat in two to five words.
Respond with a single JSON object and nothing else: {\"topic\": string or null}";

#[derive(Debug, Deserialize)]
struct RawMemories {
    #[serde(default)]
    memories: Vec<RawMemory>,
}

#[derive(Debug, Deserialize)]
struct RawMemory {
    #[serde(default)]
    kind: Option<String>,
    content: String,
    #[serde(default = "d_importance")]
    importance: f32,
}

fn d_importance() -> f32 {
    0.5
}

#[derive(Debug, Deserialize)]
struct RawTopic {
    #[serde(default)]
    topic: Option<String>,
}

/// Render messages as a plain `User:` / `Companion:` transcript.
pub fn transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for m in messages {
        let who = match m.sender {
            SenderType::User => "User",
            SenderType::Companion => "Companion",
            SenderType::System => continue,
        };
        if let Some(text) = m.content.prompt_text() {
            out.push_str(who);
            out.push_str(": ");
            out.push_str(&text);
            out.push('\n');
        }
    }
    out
}

fn parse_kind(kind: Option<&str>) -> MemoryKind {
    match kind.map(|k| k.trim().to_ascii_lowercase()).as_deref() {
        Some("preference") => MemoryKind::Preference,
        Some("milestone") | Some("emotional_milestone") => MemoryKind::Milestone,
        _ => MemoryKind::Fact,
    }
}

pub fn parse_memories(raw: &str) -> Option<Vec<MemoryEntry>> {
    let parsed: RawMemories = json::extract(raw)?;
    Some(
        parsed
            .memories
            .into_iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(|m| {
                let importance = if m.importance.is_nan() { 0.5 } else { m.importance };
                MemoryEntry::new(parse_kind(m.kind.as_deref()), m.content.trim(), importance)
            })
            .collect(),
    )
}

pub fn parse_topic(raw: &str) -> Option<String> {
    let parsed: RawTopic = json::extract(raw)?;
    parsed
        .topic
        .map(|t| t.trim().trim_end_matches('.').to_string())
        .filter(|t| !t.is_empty())
}

/// Ask the mini model for memories in `messages`. An empty transcript
/// returns no memories without calling the engine.
pub async fn extract_memories(
    engine: &dyn CompletionEngine,
    messages: &[Message],
) -> Result<Vec<MemoryEntry>> {
    let text = transcript(messages);
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let raw = engine
        .complete_mini(&[ChatTurn::system(MEMORY_PROMPT), ChatTurn::user(text)])
        .await?;
    parse_memories(&raw).ok_or_else(|| Error::Other("memory extraction reply unparsable".into()))
}

/// Ask the mini model for the current topic. `Ok(None)` when the model
/// reports no clear topic.
pub async fn detect_topic(
    engine: &dyn CompletionEngine,
    messages: &[Message],
) -> Result<Option<String>> {
    let text = transcript(messages);
    if text.is_empty() {
        return Ok(None);
    }
    let raw = engine
        .complete_mini(&[ChatTurn::system(TOPIC_PROMPT), ChatTurn::user(text)])
        .await?;
    Ok(parse_topic(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memories_parse_with_defaults() {
        let raw = r#"{"memories":[
            {"kind":"preference","content":"Likes oolong tea","importance":0.6},
            {"content":"Lives in Lisbon"},
            {"kind":"milestone","content":"   "}
        ]}"#;
        let m = parse_memories(raw).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m[0].kind, MemoryKind::Preference);
        assert_eq!(m[1].kind, MemoryKind::Fact);
        assert!((m[1].importance - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn topic_parse_trims_and_drops_null() {
        assert_eq!(parse_topic(r#"{"topic":" weekend plans. "}"#).as_deref(), Some("weekend plans"));
        assert!(parse_topic(r#"{"topic":null}"#).is_none());
        assert!(parse_topic("nothing").is_none());
    }
}
