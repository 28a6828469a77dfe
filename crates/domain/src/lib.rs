//! Shared types for the Kindred conversation turn orchestrator.
//!
//! Every other crate in the workspace depends on this one for the message
//! model, the per-conversation context, error handling, trace events and
//! configuration.

pub mod chat;
pub mod companion;
pub mod config;
pub mod context;
pub mod conversation;
pub mod emotion;
pub mod error;
pub mod trace;
