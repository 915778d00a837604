use axum::{
    Json, Router,
    routing::{get, post},
};

use nearcast_types::api::StatusResponse;

use crate::state::AppState;
use crate::{boosts, crowds, messages};

/// Build the full HTTP surface. Middleware (CORS, tracing) is layered on by
/// the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/messages", post(messages::create_message))
        .route("/messages/feed", get(messages::get_feed))
        .route("/messages/{message_id}/boost", post(boosts::boost_message))
        .route("/crowds", post(crowds::create_crowd).get(crowds::list_crowds))
        .route("/crowds/{crowd_id}/join", post(crowds::join_crowd))
        .route("/crowds/{crowd_id}/leave", post(crowds::leave_crowd))
        .with_state(state)
}

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}
