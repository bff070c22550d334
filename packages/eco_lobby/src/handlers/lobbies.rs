use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;

/// List open lobbies - same payload the router pushes as `lobby_updated`
pub async fn list_lobbies_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.router.summaries().await)
}
