pub mod engine;
pub mod openai_compat;
pub mod scripted;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use engine::{CompletionEngine, ProviderEngine};
pub use openai_compat::OpenAiCompatProvider;
pub use scripted::ScriptedEngine;
pub use traits::{ChatRequest, ChatResponse, LlmProvider, Usage};
