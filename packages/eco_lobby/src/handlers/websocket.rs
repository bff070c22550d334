use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Lobby WebSocket handler - one connection per player
pub async fn lobby_websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let router = state.router.clone();
    let metrics = state.metrics.clone();

    ws.on_upgrade(move |socket| ws::handle_lobby_ws(socket, router, metrics))
}
