//! WebSocket Protocol Types
//!
//! Message types for client-server communication. Frames are JSON with
//! a `type` tag and camelCase payload fields.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CityKey, CityProgress, JoinRejection, LobbySummary, Player};

/// Messages sent FROM the client TO the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Request the current registry projection
    ListLobbies,
    /// Create or join a lobby. An unknown `lobby_id` (or `create_new`)
    /// allocates a fresh lobby under a freshly generated id.
    JoinLobby {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lobby_id: Option<String>,
        player_name: String,
        #[serde(default)]
        create_new: bool,
    },
    /// Chat line; the server assigns the canonical timestamp
    ChatMessage { message: String },
    /// Set a city's progress to an absolute value
    UpdateProgress { city_key: CityKey, progress: i64 },
    /// Opaque relay (dice rolls and the like): broadcast to the rest of
    /// the sender's lobby on a named channel. The server never inspects
    /// the payload — all game logic lives client-side.
    Relay {
        channel: String,
        payload: serde_json::Value,
    },
    /// Liveness probe
    Ping,
}

/// Messages sent FROM the server TO the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Reply to `list_lobbies` (sender only)
    LobbyList { lobbies: Vec<LobbySummary> },
    /// Join accepted (sender only), immediately followed by `lobby_state`
    JoinSuccess {
        lobby_id: String,
        player_id: String,
        player: Player,
    },
    /// Join rejected (sender only); the connection may retry
    JoinError { reason: JoinRejection },
    /// Full lobby snapshot for a freshly joined player
    LobbyState {
        players: HashMap<String, Player>,
        city_progress: CityProgress,
    },
    /// A new member joined (everyone else in the lobby)
    PlayerJoined { player_id: String, player: Player },
    /// Chat line with the server-assigned timestamp (whole lobby,
    /// sender included — one canonical timestamp source)
    ChatBroadcast {
        player_id: String,
        player_name: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// City progress changed (lobby minus the sender, who already
    /// applied it locally)
    ProgressUpdated { city_key: CityKey, progress: i64 },
    /// Relayed opaque event (lobby minus the sender)
    PlayerRelay {
        player_id: String,
        channel: String,
        payload: serde_json::Value,
    },
    /// A member disconnected or left (remaining lobby members)
    PlayerLeft {
        player_id: String,
        player_name: String,
    },
    /// Registry projection changed (every connection)
    LobbyUpdated { lobbies: Vec<LobbySummary> },
    /// Direct reply to `ping`
    Pong {
        server_time: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lobby_id: Option<String>,
    },
}
