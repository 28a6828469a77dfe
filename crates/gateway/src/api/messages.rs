//! Message endpoints.
//!
//! - `POST /v1/conversations/:id/messages`  submit a user message
//! - `GET  /v1/conversations/:id/messages`  recent messages, oldest first

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use kd_domain::conversation::MessageContent;
use kd_domain::error::Error;
use kd_store::ConversationStore;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

const MAX_LIST_LIMIT: usize = 200;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/conversations/:id/messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stores the message and returns immediately; the companion's reply
/// arrives later as separate messages.
pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(content): Json<MessageContent>,
) -> ApiResult<impl IntoResponse> {
    if matches!(content, MessageContent::SystemEvent { .. }) {
        return Err(ApiError::BadRequest(
            "system events cannot be submitted by clients".into(),
        ));
    }
    let message = state.orchestrator.submit_user_message(&id, content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/conversations/:id/messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    if q.limit == 0 {
        return Err(ApiError::BadRequest("limit must be at least 1".into()));
    }
    if state.store.get_conversation(&id).await?.is_none() {
        return Err(Error::NotFound(format!("conversation {id}")).into());
    }
    let messages = state
        .store
        .list_recent_messages(&id, q.limit.min(MAX_LIST_LIMIT))
        .await?;
    Ok(Json(serde_json::json!({
        "conversation_id": id,
        "count": messages.len(),
        "messages": messages,
    })))
}
