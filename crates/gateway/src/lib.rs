//! Kindred gateway: the conversation turn orchestrator plus its HTTP API
//! and CLI plumbing.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
