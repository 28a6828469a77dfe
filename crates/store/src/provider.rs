//! The `ConversationStore` trait is the persistence surface the turn
//! orchestrator consumes. Implementations may be in-memory (tests, single
//! node), or adapters over a real database.

use async_trait::async_trait;
use kd_domain::companion::CompanionProfile;
use kd_domain::context::{ConversationContext, MemoryEntry};
use kd_domain::conversation::{Conversation, Message, NewMessage, SenderType};
use kd_domain::error::Result;

/// Mutation applied to a stored context under the store's own lock.
pub type ContextUpdate = Box<dyn FnOnce(&mut ConversationContext) + Send>;

/// Messages scanned by the default `latest_companion_message`.
const LATEST_SCAN: usize = 50;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a conversation between a user and a companion.
    async fn create_conversation(&self, user_id: &str, companion_id: &str)
        -> Result<Conversation>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;

    /// Persist one message and bump the conversation's last activity.
    async fn append_message(&self, msg: NewMessage) -> Result<Message>;

    /// The newest `limit` messages, oldest first.
    async fn list_recent_messages(&self, conversation_id: &str, limit: usize)
        -> Result<Vec<Message>>;

    /// Flip the read flag; the only mutation a stored message allows.
    async fn mark_read(&self, message_id: &str) -> Result<bool>;

    async fn get_context(&self, conversation_id: &str) -> Result<Option<ConversationContext>>;

    async fn save_context(&self, ctx: &ConversationContext) -> Result<()>;

    /// Durable memory log, independent of the bounded list kept in the
    /// context.
    async fn append_memories(&self, conversation_id: &str, entries: &[MemoryEntry]) -> Result<()>;

    async fn list_memories(&self, conversation_id: &str) -> Result<Vec<MemoryEntry>>;

    async fn get_companion_profile(&self, companion_id: &str) -> Result<Option<CompanionProfile>>;

    async fn upsert_companion(&self, profile: CompanionProfile) -> Result<()>;

    /// Fetch the persisted context, creating and persisting defaults when
    /// absent.
    async fn get_or_create_context(&self, conversation_id: &str) -> Result<ConversationContext> {
        if let Some(ctx) = self.get_context(conversation_id).await? {
            return Ok(ctx);
        }
        let ctx = ConversationContext::new(conversation_id);
        self.save_context(&ctx).await?;
        Ok(ctx)
    }

    /// Read-modify-write of a context. The default is a plain
    /// load/apply/save; stores that can should do it atomically.
    async fn update_context(
        &self,
        conversation_id: &str,
        update: ContextUpdate,
    ) -> Result<ConversationContext> {
        let mut ctx = self.get_or_create_context(conversation_id).await?;
        update(&mut ctx);
        ctx.touch();
        self.save_context(&ctx).await?;
        Ok(ctx)
    }

    /// Most recent message sent by the companion, if any.
    async fn latest_companion_message(&self, conversation_id: &str) -> Result<Option<Message>> {
        let recent = self.list_recent_messages(conversation_id, LATEST_SCAN).await?;
        Ok(recent
            .into_iter()
            .rev()
            .find(|m| m.sender == SenderType::Companion))
    }
}
