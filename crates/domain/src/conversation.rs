//! Conversation and message records as the orchestrator sees them.
//!
//! Messages are created once per chunk and never mutated afterwards except
//! for the `read` flag. The three delivery-sequencing fields let clients
//! reconstruct a multi-bubble reply and infer typing status after a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub companion_id: String,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>, companion_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            companion_id: companion_id.into(),
            archived: false,
            created_at: now,
            last_activity_at: now,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Companion,
    System,
}

impl SenderType {
    pub fn as_str(self) -> &'static str {
        match self {
            SenderType::User => "user",
            SenderType::Companion => "companion",
            SenderType::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Media {
        media_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Sticker {
        sticker_id: String,
    },
    SystemEvent {
        event: String,
    },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Reject malformed content before it reaches the orchestrator.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Text { text } if text.trim().is_empty() => {
                Err(Error::Validation("text message must not be empty".into()))
            }
            Self::Media { media_url, .. } if media_url.trim().is_empty() => {
                Err(Error::Validation("media message requires a media reference".into()))
            }
            Self::Sticker { sticker_id } if sticker_id.trim().is_empty() => {
                Err(Error::Validation("sticker message requires a sticker id".into()))
            }
            _ => Ok(()),
        }
    }

    /// Text rendering used when this message becomes a prompt turn.
    /// System events are not part of the dialogue and render as `None`.
    pub fn prompt_text(&self) -> Option<String> {
        match self {
            Self::Text { text } => Some(text.clone()),
            Self::Media { caption, .. } => Some(match caption {
                Some(c) if !c.trim().is_empty() => format!("[shared a photo] {c}"),
                _ => "[shared a photo]".to_string(),
            }),
            Self::Sticker { .. } => Some("[sent a sticker]".to_string()),
            Self::SystemEvent { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: SenderType,
    pub content: MessageContent,
    #[serde(default)]
    pub read: bool,
    /// 0-based position within a multi-chunk reply.
    #[serde(default)]
    pub chunk_index: usize,
    /// Number of chunks in the reply this message belongs to.
    #[serde(default = "d_one")]
    pub chunk_total: usize,
    /// True for every chunk except the last one of a reply.
    #[serde(default)]
    pub is_typing: bool,
    pub created_at: DateTime<Utc>,
}

fn d_one() -> usize {
    1
}

/// Insert payload for [`Message`]; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender: SenderType,
    pub content: MessageContent,
    pub chunk_index: usize,
    pub chunk_total: usize,
    pub is_typing: bool,
}

impl NewMessage {
    pub fn user(conversation_id: impl Into<String>, content: MessageContent) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender: SenderType::User,
            content,
            chunk_index: 0,
            chunk_total: 1,
            is_typing: false,
        }
    }

    pub fn companion_chunk(
        conversation_id: impl Into<String>,
        text: impl Into<String>,
        chunk_index: usize,
        chunk_total: usize,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender: SenderType::Companion,
            content: MessageContent::text(text),
            chunk_index,
            chunk_total,
            is_typing: chunk_index + 1 < chunk_total,
        }
    }

    pub fn into_message(self) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: self.conversation_id,
            sender: self.sender,
            content: self.content,
            read: false,
            chunk_index: self.chunk_index,
            chunk_total: self.chunk_total,
            is_typing: self.is_typing,
            created_at: Utc::now(),
        }
    }
}
