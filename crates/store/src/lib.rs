//! Persistence for Kindred conversations.
//!
//! The orchestrator only talks to [`ConversationStore`]; [`InMemoryStore`] is
//! the bundled implementation, optionally snapshotted to a JSON file.

pub mod memory;
pub mod provider;

pub use memory::{InMemoryStore, StoreStats};
pub use provider::{ContextUpdate, ConversationStore};
