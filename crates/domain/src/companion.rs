use serde::{Deserialize, Serialize};

/// Stable description of an AI companion, used for the identity layer of the
/// prompt and for pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionProfile {
    pub id: String,
    pub name: String,
    /// Free-form personality description.
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub speaking_style: Option<String>,
    #[serde(default)]
    pub traits: PersonalityTraits,
}

/// Trait scalars, each 0.0 – 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalityTraits {
    #[serde(default = "d_half")]
    pub confidence: f32,
    #[serde(default = "d_half")]
    pub intelligence: f32,
    #[serde(default = "d_half")]
    pub warmth: f32,
    #[serde(default = "d_half")]
    pub humor: f32,
}

impl Default for PersonalityTraits {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            intelligence: 0.5,
            warmth: 0.5,
            humor: 0.5,
        }
    }
}

fn d_half() -> f32 {
    0.5
}

/// Traits at or above this level count as "high".
pub const HIGH_TRAIT: f32 = 0.7;

impl PersonalityTraits {
    pub fn high_confidence(&self) -> bool {
        self.confidence >= HIGH_TRAIT
    }

    pub fn high_intelligence(&self) -> bool {
        self.intelligence >= HIGH_TRAIT
    }
}

impl CompanionProfile {
    /// Fallback profile used when a conversation references an unknown
    /// companion; the turn still gets a reply.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Companion".into(),
            personality: "friendly, curious and supportive".into(),
            backstory: String::new(),
            interests: Vec::new(),
            speaking_style: None,
            traits: PersonalityTraits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traits_default_when_omitted() {
        let p: CompanionProfile =
            serde_json::from_str(r#"{"id":"mia","name":"Mia","traits":{"confidence":0.9}}"#)
                .unwrap();
        assert!(p.traits.high_confidence());
        assert!(!p.traits.high_intelligence());
        assert!((p.traits.warmth - 0.5).abs() < f32::EPSILON);
    }
}
