use std::sync::Arc;

use kd_domain::config::Config;
use kd_store::InMemoryStore;

use crate::runtime::TurnOrchestrator;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub config_path: String,
    // ── Persistence ──────────────────────────────────────────────────
    pub store: Arc<InMemoryStore>,
    // ── Turn orchestration ───────────────────────────────────────────
    pub orchestrator: Arc<TurnOrchestrator>,
    // ── Lifecycle ────────────────────────────────────────────────────
    /// Notified to trigger graceful shutdown.
    pub shutdown_tx: Arc<tokio::sync::Notify>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}
