//! Domain types shared across the registry, protocol, and HTTP handlers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed player color palette, indexed by join order modulo its length.
pub const PALETTE: [&str; 6] = [
    "#4ecdc4", "#ff6b6b", "#2ecc71", "#f39c12", "#9b59b6", "#3498db",
];

/// Color for the nth player to join a lobby.
pub fn player_color(join_index: usize) -> &'static str {
    PALETTE[join_index % PALETTE.len()]
}

/// The closed set of cities players clean up. Unknown keys fail
/// deserialization, so progress updates can never target an
/// out-of-range key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CityKey {
    Tver,
    Kineshma,
    NaberezhnyeChelny,
    Kazan,
    Volgograd,
    Astrakhan,
}

impl CityKey {
    pub const ALL: [CityKey; 6] = [
        CityKey::Tver,
        CityKey::Kineshma,
        CityKey::NaberezhnyeChelny,
        CityKey::Kazan,
        CityKey::Volgograd,
        CityKey::Astrakhan,
    ];
}

/// Per-lobby city progress map. Defaults to zero for every key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityProgress(HashMap<CityKey, i64>);

impl Default for CityProgress {
    fn default() -> Self {
        Self(CityKey::ALL.iter().map(|&k| (k, 0)).collect())
    }
}

impl CityProgress {
    pub fn get(&self, key: CityKey) -> i64 {
        self.0.get(&key).copied().unwrap_or(0)
    }

    /// Store an absolute progress value. The value is opaque to the
    /// server: no clamping or accumulation.
    pub fn set(&mut self, key: CityKey, progress: i64) {
        self.0.insert(key, progress);
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.values().all(|&v| v == 0)
    }
}

/// Per-connection membership record inside a lobby.
///
/// `id` equals the owning connection's id. Everything past `color` is
/// game progress the server stores and relays but never interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub color: String,
    pub position: u32,
    pub city: CityKey,
    pub coins: i64,
    pub cleaning_points: i64,
    pub buildings: Vec<String>,
    pub level: u32,
    pub completed_tasks: u32,
    pub current_task: Option<serde_json::Value>,
    pub current_difficulty: String,
}

impl Player {
    /// Fresh player with default game-state fields.
    pub fn new(id: String, name: String, color: String) -> Self {
        Self {
            id,
            name,
            color,
            position: 0,
            city: CityKey::Tver,
            coins: 100,
            cleaning_points: 0,
            buildings: Vec::new(),
            level: 1,
            completed_tasks: 0,
            current_task: None,
            current_difficulty: "easy".to_string(),
        }
    }
}

/// Reasons a join attempt is rejected. Reported to the requesting
/// connection only; never a server fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum JoinRejection {
    #[error("display name must be at least 2 characters")]
    NameTooShort,
    #[error("a player with that name is already in the lobby")]
    NameTaken,
    #[error("lobby is full")]
    LobbyFull,
}

/// Read-only lobby projection for discovery listings. Carries no
/// references into live registry state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbySummary {
    pub id: String,
    pub player_count: usize,
    pub max_players: usize,
    pub created_at: DateTime<Utc>,
    /// Display names in join order.
    pub players: Vec<String>,
}
