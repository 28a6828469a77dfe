//! In-memory conversation store.
//!
//! Holds conversations, messages, contexts, memory logs and companion
//! profiles behind a single `RwLock`. When constructed with a state path the
//! whole snapshot can be flushed to and reloaded from `store.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use kd_domain::companion::CompanionProfile;
use kd_domain::context::{ConversationContext, MemoryEntry};
use kd_domain::conversation::{Conversation, Message, NewMessage};
use kd_domain::error::{Error, Result};
use kd_domain::trace::TraceEvent;

use crate::provider::{ContextUpdate, ConversationStore};

const SNAPSHOT_FILE: &str = "store.json";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    conversations: HashMap<String, Conversation>,
    /// Per conversation, in insertion order.
    #[serde(default)]
    messages: HashMap<String, Vec<Message>>,
    #[serde(default)]
    contexts: HashMap<String, ConversationContext>,
    #[serde(default)]
    memories: HashMap<String, Vec<MemoryEntry>>,
    #[serde(default)]
    companions: HashMap<String, CompanionProfile>,
}

/// Counts exposed for health reporting.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreStats {
    pub conversations: usize,
    pub messages: usize,
    pub companions: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct InMemoryStore {
    snapshot_path: Option<PathBuf>,
    inner: RwLock<Snapshot>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Volatile store; `flush` is a no-op.
    pub fn new() -> Self {
        Self {
            snapshot_path: None,
            inner: RwLock::new(Snapshot::default()),
        }
    }

    /// Load or create the store at `state_path/store.json`.
    pub fn open(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path)?;
        let snapshot_path = state_path.join(SNAPSHOT_FILE);

        let snapshot = if snapshot_path.exists() {
            let raw = std::fs::read_to_string(&snapshot_path)?;
            match serde_json::from_str::<Snapshot>(&raw) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(
                        path = %snapshot_path.display(),
                        error = %e,
                        "store snapshot unreadable, starting empty"
                    );
                    Snapshot::default()
                }
            }
        } else {
            Snapshot::default()
        };

        tracing::info!(
            conversations = snapshot.conversations.len(),
            companions = snapshot.companions.len(),
            path = %snapshot_path.display(),
            "conversation store loaded"
        );

        Ok(Self {
            snapshot_path: Some(snapshot_path),
            inner: RwLock::new(snapshot),
        })
    }

    /// Persist the current state to disk. Written to a temp file first and
    /// renamed so a crash mid-write never truncates the snapshot.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let json = {
            let inner = self.inner.read();
            serde_json::to_string_pretty(&*inner)
                .map_err(|e| Error::Store(format!("serializing snapshot: {e}")))?
        };
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            conversations: inner.conversations.len(),
            messages: inner.messages.values().map(Vec::len).sum(),
            companions: inner.companions.len(),
        }
    }

    pub fn list_conversations(&self) -> Vec<Conversation> {
        self.inner.read().conversations.values().cloned().collect()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_conversation(
        &self,
        user_id: &str,
        companion_id: &str,
    ) -> Result<Conversation> {
        if user_id.trim().is_empty() || companion_id.trim().is_empty() {
            return Err(Error::Validation(
                "user_id and companion_id are required".into(),
            ));
        }
        let conv = Conversation::new(user_id, companion_id);
        self.inner
            .write()
            .conversations
            .insert(conv.id.clone(), conv.clone());
        Ok(conv)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.inner.read().conversations.get(id).cloned())
    }

    async fn append_message(&self, msg: NewMessage) -> Result<Message> {
        let message = msg.into_message();
        {
            let mut inner = self.inner.write();
            let conv = inner
                .conversations
                .get_mut(&message.conversation_id)
                .ok_or_else(|| {
                    Error::NotFound(format!("conversation {}", message.conversation_id))
                })?;
            conv.last_activity_at = message.created_at;
            inner
                .messages
                .entry(message.conversation_id.clone())
                .or_default()
                .push(message.clone());
        }

        TraceEvent::MessageStored {
            conversation_id: message.conversation_id.clone(),
            message_id: message.id.clone(),
            sender: message.sender.as_str().to_owned(),
        }
        .emit();

        Ok(message)
    }

    async fn list_recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let inner = self.inner.read();
        let Some(all) = inner.messages.get(conversation_id) else {
            return Ok(Vec::new());
        };
        let skip = all.len().saturating_sub(limit);
        Ok(all[skip..].to_vec())
    }

    async fn mark_read(&self, message_id: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        for msgs in inner.messages.values_mut() {
            if let Some(m) = msgs.iter_mut().find(|m| m.id == message_id) {
                let changed = !m.read;
                m.read = true;
                return Ok(changed);
            }
        }
        Err(Error::NotFound(format!("message {message_id}")))
    }

    async fn get_context(&self, conversation_id: &str) -> Result<Option<ConversationContext>> {
        Ok(self.inner.read().contexts.get(conversation_id).cloned())
    }

    async fn save_context(&self, ctx: &ConversationContext) -> Result<()> {
        self.inner
            .write()
            .contexts
            .insert(ctx.conversation_id.clone(), ctx.clone());
        Ok(())
    }

    async fn update_context(
        &self,
        conversation_id: &str,
        update: ContextUpdate,
    ) -> Result<ConversationContext> {
        let mut inner = self.inner.write();
        let ctx = inner
            .contexts
            .entry(conversation_id.to_owned())
            .or_insert_with(|| ConversationContext::new(conversation_id));
        update(ctx);
        ctx.updated_at = Utc::now();
        Ok(ctx.clone())
    }

    async fn append_memories(&self, conversation_id: &str, entries: &[MemoryEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.inner
            .write()
            .memories
            .entry(conversation_id.to_owned())
            .or_default()
            .extend_from_slice(entries);
        Ok(())
    }

    async fn list_memories(&self, conversation_id: &str) -> Result<Vec<MemoryEntry>> {
        Ok(self
            .inner
            .read()
            .memories
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_companion_profile(&self, companion_id: &str) -> Result<Option<CompanionProfile>> {
        Ok(self.inner.read().companions.get(companion_id).cloned())
    }

    async fn upsert_companion(&self, profile: CompanionProfile) -> Result<()> {
        self.inner
            .write()
            .companions
            .insert(profile.id.clone(), profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kd_domain::conversation::{MessageContent, SenderType};

    #[tokio::test]
    async fn append_requires_known_conversation() {
        let store = InMemoryStore::new();
        let err = store
            .append_message(NewMessage::user("missing", MessageContent::text("hi")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn recent_messages_are_chronological_and_bounded() {
        let store = InMemoryStore::new();
        let conv = store.create_conversation("u1", "c1").await.unwrap();
        for i in 0..5 {
            store
                .append_message(NewMessage::user(&conv.id, MessageContent::text(format!("m{i}"))))
                .await
                .unwrap();
        }
        let recent = store.list_recent_messages(&conv.id, 3).await.unwrap();
        let texts: Vec<_> = recent
            .iter()
            .map(|m| m.content.prompt_text().unwrap())
            .collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn latest_companion_message_skips_user_messages() {
        let store = InMemoryStore::new();
        let conv = store.create_conversation("u1", "c1").await.unwrap();
        store
            .append_message(NewMessage::companion_chunk(&conv.id, "first", 0, 2))
            .await
            .unwrap();
        store
            .append_message(NewMessage::companion_chunk(&conv.id, "second", 1, 2))
            .await
            .unwrap();
        store
            .append_message(NewMessage::user(&conv.id, MessageContent::text("ok")))
            .await
            .unwrap();

        let latest = store
            .latest_companion_message(&conv.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.sender, SenderType::Companion);
        assert_eq!(latest.chunk_index, 1);
        assert!(!latest.is_typing);
    }

    #[tokio::test]
    async fn get_or_create_context_persists_defaults() {
        let store = InMemoryStore::new();
        assert!(store.get_context("c").await.unwrap().is_none());
        let ctx = store.get_or_create_context("c").await.unwrap();
        assert!((ctx.trust_level - 0.5).abs() < f32::EPSILON);
        assert!(store.get_context("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_context_applies_in_place() {
        let store = InMemoryStore::new();
        let ctx = store
            .update_context("c", Box::new(|ctx| ctx.turn_count += 3))
            .await
            .unwrap();
        assert_eq!(ctx.turn_count, 3);
        let stored = store.get_context("c").await.unwrap().unwrap();
        assert_eq!(stored.turn_count, 3);
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let store = InMemoryStore::new();
        let conv = store.create_conversation("u1", "c1").await.unwrap();
        let msg = store
            .append_message(NewMessage::user(&conv.id, MessageContent::text("hi")))
            .await
            .unwrap();
        assert!(store.mark_read(&msg.id).await.unwrap());
        assert!(!store.mark_read(&msg.id).await.unwrap());
        assert!(store.mark_read("nope").await.is_err());
    }
}
