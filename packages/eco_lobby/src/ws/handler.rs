//! WebSocket Handler
//!
//! Per-connection socket loop: pump outbound messages from the
//! router's channel, parse inbound frames and dispatch them, clean up
//! membership on disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::metrics::ServerMetrics;

use super::protocol::{ClientMessage, ServerMessage};
use super::router::LobbyRouter;

/// Channel capacity for messages to the client
const SEND_CHANNEL_CAPACITY: usize = 100;

/// Handle one lobby WebSocket connection from upgrade to close.
pub async fn handle_lobby_ws(
    socket: WebSocket,
    router: Arc<LobbyRouter>,
    metrics: Arc<ServerMetrics>,
) {
    // The connection id doubles as the player id once bound.
    let connection_id = uuid::Uuid::new_v4().to_string();
    info!(conn = %connection_id, "New lobby WebSocket connection");
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(SEND_CHANNEL_CAPACITY);
    router.register(&connection_id, tx).await;

    // Task to send messages to the WebSocket
    let sender_task = async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    };

    // Task to handle incoming messages
    let router_in = router.clone();
    let conn = connection_id.clone();
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => router_in.handle(&conn, client_msg).await,
                    Err(e) => {
                        debug!(conn = %conn, error = %e, "Ignoring unparseable frame");
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!(conn = %conn, "Client closed connection");
                    break;
                }
                Err(e) => {
                    error!(conn = %conn, "WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = sender_task => debug!("Sender task ended"),
        _ = input_task => debug!("Input task ended"),
    }

    // Membership cleanup and player_left fan-out happen here, whether
    // the client closed cleanly or the transport dropped.
    router.disconnect(&connection_id).await;
    metrics.connection_closed();
    info!(conn = %connection_id, "Lobby WebSocket connection closed");
}
