//! `GET /v1/health`: liveness plus orchestrator counters.

use axum::extract::{Json, State};
use axum::response::IntoResponse;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let orch = &state.orchestrator;
    let uptime_secs = (chrono::Utc::now() - state.started_at).num_seconds().max(0);
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime_secs,
        "engine": orch.engine_id(),
        "generations_in_flight": orch.guard().active_count(),
        "aggregation_windows_open": orch.scheduler().pending_count(),
        "typing_entries": orch.typing().len(),
        "background": orch.background().stats(),
        "store": state.store.stats(),
    }))
}
