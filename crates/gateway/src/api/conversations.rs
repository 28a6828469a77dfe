//! Conversation endpoints.
//!
//! - `POST /v1/conversations`              create a conversation
//! - `GET  /v1/conversations/:id`          conversation record
//! - `GET  /v1/conversations/:id/context`  relationship / emotion / memory snapshot

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use kd_domain::error::Error;
use kd_store::ConversationStore;

use super::error::ApiResult;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/conversations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CreateConversationBody {
    pub user_id: String,
    pub companion_id: String,
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateConversationBody>,
) -> ApiResult<impl IntoResponse> {
    let conv = state
        .store
        .create_conversation(&body.user_id, &body.companion_id)
        .await?;
    if state
        .store
        .get_companion_profile(&conv.companion_id)
        .await?
        .is_none()
    {
        tracing::warn!(
            conversation_id = %conv.id,
            companion_id = %conv.companion_id,
            "conversation references an unknown companion"
        );
    }
    tracing::info!(conversation_id = %conv.id, user_id = %conv.user_id, "conversation created");
    Ok((StatusCode::CREATED, Json(conv)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/conversations/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let conv = state
        .store
        .get_conversation(&id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("conversation {id}")))?;
    Ok(Json(conv))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/conversations/:id/context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Read-only view of the conversation's context. Not synchronized with an
/// in-flight generation; callers may see the state just before its write.
pub async fn context(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if state.store.get_conversation(&id).await?.is_none() {
        return Err(Error::NotFound(format!("conversation {id}")).into());
    }
    let ctx = state.orchestrator.context().get_or_create_context(&id).await?;
    Ok(Json(ctx))
}
