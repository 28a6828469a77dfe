//! Context builder for companion replies.
//!
//! [`builder`] assembles the layered system prompt deterministically from a
//! context snapshot; [`manager::ContextManager`] keeps the persisted
//! `ConversationContext` current (emotions, memories, topic, relationship).

pub mod builder;
pub mod emotion;
pub mod extraction;
pub mod json;
pub mod layers;
pub mod manager;
pub mod report;

pub use builder::{pending_burst, prompt_turns, PromptBuilder, PromptInput};
pub use layers::Layer;
pub use manager::ContextManager;
pub use report::{ContextReport, LayerReport};
