pub mod conversations;
pub mod error;
pub mod health;
pub mod messages;
pub mod typing;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the `/v1` API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Conversations
        .route("/v1/conversations", post(conversations::create))
        .route("/v1/conversations/:id", get(conversations::get))
        .route("/v1/conversations/:id/context", get(conversations::context))
        // Messages
        .route(
            "/v1/conversations/:id/messages",
            get(messages::list).post(messages::submit),
        )
        // Typing indicator
        .route("/v1/conversations/:id/typing", get(typing::poll))
        // Health
        .route("/v1/health", get(health::health))
}
