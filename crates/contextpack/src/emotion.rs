//! Emotion classification via the mini model, with a neutral fallback.

use serde::Deserialize;

use kd_domain::chat::ChatTurn;
use kd_domain::emotion::EmotionalState;
use kd_providers::CompletionEngine;

use crate::json;

const CLASSIFIER_PROMPT: &str = "\
Classify the emotional state expressed in the user's chat message(s).
Respond with a single JSON object and nothing else:
{\"primary\": string, \"secondary\": string or null, \"intensity\": number 0-1, \
\"confidence\": number 0-1, \"triggers\": [short phrases from the message]}
Use lowercase single-word labels such as joy, sadness, anxiety, frustration, \
excitement, loneliness, gratitude, neutral.";

#[derive(Debug, Deserialize)]
struct RawEmotion {
    primary: String,
    #[serde(default)]
    secondary: Option<String>,
    #[serde(default = "d_intensity")]
    intensity: f32,
    #[serde(default = "d_confidence")]
    confidence: f32,
    #[serde(default)]
    triggers: Vec<String>,
}

fn d_intensity() -> f32 {
    0.5
}
fn d_confidence() -> f32 {
    0.5
}

/// Outcome of one classification.
#[derive(Debug, Clone)]
pub struct EmotionAnalysis {
    pub state: EmotionalState,
    /// True when the neutral default was used.
    pub fallback: bool,
}

/// Parse a classifier reply. `None` when no usable object is present.
pub fn parse_emotion(raw: &str) -> Option<EmotionalState> {
    let parsed: RawEmotion = json::extract(raw)?;
    if parsed.primary.trim().is_empty() {
        return None;
    }
    Some(
        EmotionalState {
            primary: parsed.primary,
            secondary: parsed.secondary,
            intensity: parsed.intensity,
            confidence: parsed.confidence,
            triggers: parsed.triggers,
        }
        .normalized(),
    )
}

/// Classify `text`. Never fails: empty input, engine errors and unparsable
/// replies all yield [`EmotionalState::neutral`].
pub async fn analyze(engine: &dyn CompletionEngine, text: &str) -> EmotionAnalysis {
    let neutral = EmotionAnalysis {
        state: EmotionalState::neutral(),
        fallback: true,
    };
    if text.trim().is_empty() {
        return neutral;
    }

    let turns = [ChatTurn::system(CLASSIFIER_PROMPT), ChatTurn::user(text)];
    match engine.complete_mini(&turns).await {
        Ok(raw) => match parse_emotion(&raw) {
            Some(state) => EmotionAnalysis {
                state,
                fallback: false,
            },
            None => {
                tracing::warn!(reply_chars = raw.len(), "emotion classifier reply unparsable");
                neutral
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "emotion classifier failed, using neutral");
            neutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kd_providers::ScriptedEngine;

    #[test]
    fn parse_normalizes_and_clamps() {
        let s = parse_emotion(r#"{"primary":" Joy ","intensity":1.7,"confidence":0.9,"triggers":["promotion",""]}"#)
            .unwrap();
        assert_eq!(s.primary, "joy");
        assert!((s.intensity - 1.0).abs() < f32::EPSILON);
        assert_eq!(s.triggers, vec!["promotion".to_string()]);
    }

    #[test]
    fn parse_rejects_missing_primary() {
        assert!(parse_emotion(r#"{"intensity":0.4}"#).is_none());
        assert!(parse_emotion(r#"{"primary":"  "}"#).is_none());
    }

    #[tokio::test]
    async fn empty_text_skips_classifier() {
        let engine = ScriptedEngine::new();
        let out = analyze(&engine, "   ").await;
        assert!(out.fallback);
        assert_eq!(engine.mini_calls(), 0);
    }

    #[tokio::test]
    async fn classifier_failure_is_neutral() {
        let engine = ScriptedEngine::new();
        let out = analyze(&engine, "I got the job!").await;
        assert!(out.fallback);
        assert_eq!(out.state, EmotionalState::neutral());
    }

    #[tokio::test]
    async fn classifier_reply_is_used() {
        let engine = ScriptedEngine::new();
        engine.push_mini_reply(r#"{"primary":"sadness","intensity":0.8,"confidence":0.7,"triggers":["miss her"]}"#);
        let out = analyze(&engine, "I miss her").await;
        assert!(!out.fallback);
        assert_eq!(out.state.primary, "sadness");
    }
}
