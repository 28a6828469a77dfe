//! `GET /v1/conversations/:id/typing`: typing indicator for polling clients.

use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;

use super::error::ApiResult;
use crate::state::AppState;

pub async fn poll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let status = state.orchestrator.poll_typing_status(&id).await?;
    Ok(Json(status))
}
