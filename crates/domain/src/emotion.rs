use serde::{Deserialize, Serialize};

/// Classified emotional state of one user message (or burst).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    /// Lowercase emotion label, e.g. `"joy"`, `"sadness"`, `"neutral"`.
    pub primary: String,
    #[serde(default)]
    pub secondary: Option<String>,
    /// 0.0 – 1.0
    pub intensity: f32,
    /// 0.0 – 1.0
    pub confidence: f32,
    /// Phrases in the message that triggered the classification.
    #[serde(default)]
    pub triggers: Vec<String>,
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self::neutral()
    }
}

impl EmotionalState {
    pub fn neutral() -> Self {
        Self {
            primary: "neutral".into(),
            secondary: None,
            intensity: 0.3,
            confidence: 0.5,
            triggers: Vec::new(),
        }
    }

    /// Normalize labels and clamp the scalars into `[0, 1]`.
    pub fn normalized(mut self) -> Self {
        self.primary = self.primary.trim().to_lowercase();
        if self.primary.is_empty() {
            self.primary = "neutral".into();
        }
        self.secondary = self
            .secondary
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        self.intensity = clamp_unit(self.intensity);
        self.confidence = clamp_unit(self.confidence);
        self.triggers.retain(|t| !t.trim().is_empty());
        self
    }

    pub fn valence(&self) -> Valence {
        Valence::of(&self.primary)
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Coarse grouping of emotion labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Valence {
    Positive,
    Negative,
    /// Anxiety, frustration and other high-arousal negative states.
    Agitated,
    Neutral,
}

const POSITIVE: &[&str] = &[
    "joy", "happiness", "happy", "excitement", "excited", "gratitude", "grateful", "love",
    "pride", "proud", "contentment", "amusement", "hope", "hopeful", "relief", "affection",
];
const NEGATIVE: &[&str] = &[
    "sadness", "sad", "loneliness", "lonely", "grief", "hurt", "disappointment",
    "disappointed", "shame", "guilt", "regret", "melancholy",
];
const AGITATED: &[&str] = &[
    "anxiety", "anxious", "fear", "afraid", "worry", "worried", "stress", "stressed",
    "frustration", "frustrated", "anger", "angry", "nervousness", "nervous", "irritation",
];

impl Valence {
    pub fn of(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if POSITIVE.contains(&label.as_str()) {
            Valence::Positive
        } else if AGITATED.contains(&label.as_str()) {
            Valence::Agitated
        } else if NEGATIVE.contains(&label.as_str()) {
            Valence::Negative
        } else {
            Valence::Neutral
        }
    }
}

/// The companion's side of an emotional exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanionReaction {
    Empathy,
    SharedJoy,
    Calm,
    Neutral,
}

impl CompanionReaction {
    /// Fixed lookup from the user's emotion to the companion's reaction.
    pub fn for_state(state: &EmotionalState) -> Self {
        match state.valence() {
            Valence::Negative => CompanionReaction::Empathy,
            Valence::Positive => CompanionReaction::SharedJoy,
            Valence::Agitated => CompanionReaction::Calm,
            Valence::Neutral => CompanionReaction::Neutral,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompanionReaction::Empathy => "empathy",
            CompanionReaction::SharedJoy => "shared_joy",
            CompanionReaction::Calm => "calm",
            CompanionReaction::Neutral => "neutral",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(label: &str) -> EmotionalState {
        EmotionalState { primary: label.into(), ..EmotionalState::neutral() }
    }

    #[test]
    fn reaction_lookup() {
        assert_eq!(CompanionReaction::for_state(&state("sadness")), CompanionReaction::Empathy);
        assert_eq!(CompanionReaction::for_state(&state("joy")), CompanionReaction::SharedJoy);
        assert_eq!(CompanionReaction::for_state(&state("anxiety")), CompanionReaction::Calm);
        assert_eq!(CompanionReaction::for_state(&state("frustration")), CompanionReaction::Calm);
        assert_eq!(CompanionReaction::for_state(&state("curiosity")), CompanionReaction::Neutral);
    }

    #[test]
    fn normalized_clamps_and_lowercases() {
        let s = EmotionalState {
            primary: "  JOY ".into(),
            secondary: Some("".into()),
            intensity: 1.7,
            confidence: f32::NAN,
            triggers: vec!["".into(), "won the match".into()],
        }
        .normalized();
        assert_eq!(s.primary, "joy");
        assert!(s.secondary.is_none());
        assert_eq!(s.intensity, 1.0);
        assert_eq!(s.confidence, 0.0);
        assert_eq!(s.triggers, vec!["won the match".to_string()]);
    }

    #[test]
    fn blank_label_becomes_neutral() {
        let s = EmotionalState { primary: " ".into(), ..EmotionalState::neutral() }.normalized();
        assert_eq!(s.primary, "neutral");
    }
}
