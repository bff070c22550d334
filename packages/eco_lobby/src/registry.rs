//! Lobby Registry
//!
//! Single owner of all live lobbies. Creates ids, enforces membership
//! rules, produces read-only projections, and reclaims abandoned
//! lobbies. All mutation goes through `&mut self`; concurrency is the
//! caller's problem (the router holds this behind one lock).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::models::{CityProgress, JoinRejection, LobbySummary, Player, player_color};

const LOBBY_ID_LEN: usize = 6;
const LOBBY_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Minimum trimmed display-name length accepted by `join`.
const MIN_NAME_CHARS: usize = 2;

/// Name rule shared by `Lobby::join` and the router's pre-check, which
/// rejects doomed joins before allocating a lobby.
pub fn name_too_short(candidate: &str) -> bool {
    candidate.trim().chars().count() < MIN_NAME_CHARS
}

/// An ephemeral group of up to `max_players` connections sharing
/// broadcast scope and game state.
#[derive(Debug, Clone)]
pub struct Lobby {
    pub id: String,
    /// Join order preserved; player ids are connection ids and unique.
    players: Vec<Player>,
    pub city_progress: CityProgress,
    pub created_at: DateTime<Utc>,
    pub max_players: usize,
    /// When the lobby last became (or was created) empty. `None` while
    /// occupied. Drives the reaper's grace clock.
    empty_since: Option<DateTime<Utc>>,
}

impl Lobby {
    fn new(id: String, max_players: usize, now: DateTime<Utc>) -> Self {
        Self {
            id,
            players: Vec::new(),
            city_progress: CityProgress::default(),
            created_at: now,
            max_players,
            empty_since: Some(now),
        }
    }

    /// Validate and admit a player. Rejections leave the lobby
    /// untouched. Notification of other members is the router's job.
    pub fn join(
        &mut self,
        candidate_name: &str,
        connection_id: &str,
    ) -> Result<Player, JoinRejection> {
        let name = candidate_name.trim();
        if name_too_short(name) {
            return Err(JoinRejection::NameTooShort);
        }
        if self.players.iter().any(|p| p.name == name) {
            return Err(JoinRejection::NameTaken);
        }
        if self.players.len() >= self.max_players {
            return Err(JoinRejection::LobbyFull);
        }

        let player = Player::new(
            connection_id.to_string(),
            name.to_string(),
            player_color(self.players.len()).to_string(),
        );
        self.players.push(player.clone());
        self.empty_since = None;
        Ok(player)
    }

    /// Remove and return the member for `connection_id`. `None` when
    /// the connection was never a member; callers tolerate that
    /// silently since disconnects can race an already-processed leave.
    pub fn leave(&mut self, connection_id: &str, now: DateTime<Utc>) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.id == connection_id)?;
        let player = self.players.remove(idx);
        if self.players.is_empty() {
            self.empty_since = Some(now);
        }
        Some(player)
    }

    pub fn player(&self, connection_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == connection_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players keyed by id, for full-state snapshots on the wire.
    pub fn players_by_id(&self) -> HashMap<String, Player> {
        self.players
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect()
    }

    pub fn summary(&self) -> LobbySummary {
        LobbySummary {
            id: self.id.clone(),
            player_count: self.players.len(),
            max_players: self.max_players,
            created_at: self.created_at,
            players: self.players.iter().map(|p| p.name.clone()).collect(),
        }
    }
}

/// Owns the id → Lobby map. Lobbies are created on demand and removed
/// either explicitly or by the reaper sweep.
#[derive(Debug)]
pub struct LobbyRegistry {
    lobbies: HashMap<String, Lobby>,
    max_players: usize,
}

impl LobbyRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            lobbies: HashMap::new(),
            max_players,
        }
    }

    /// Create a lobby under a freshly generated unique id.
    pub fn create(&mut self, now: DateTime<Utc>) -> &mut Lobby {
        let id = self.generate_unique_id();
        let lobby = Lobby::new(id.clone(), self.max_players, now);
        self.lobbies.entry(id).or_insert(lobby)
    }

    pub fn get(&self, id: &str) -> Option<&Lobby> {
        self.lobbies.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Lobby> {
        self.lobbies.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lobbies.contains_key(id)
    }

    /// Idempotent removal; deleting a missing id is a no-op.
    pub fn delete(&mut self, id: &str) {
        self.lobbies.remove(id);
    }

    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }

    /// Registry projection used for discovery listings.
    pub fn summaries(&self) -> Vec<LobbySummary> {
        self.lobbies.values().map(Lobby::summary).collect()
    }

    /// Delete lobbies that have been continuously empty for longer
    /// than `grace`. Returns the number removed. Never touches a lobby
    /// with at least one member.
    pub fn sweep(&mut self, now: DateTime<Utc>, grace: Duration) -> usize {
        let before = self.lobbies.len();
        self.lobbies.retain(|_, lobby| match lobby.empty_since {
            Some(since) => now - since <= grace,
            None => true,
        });
        before - self.lobbies.len()
    }

    /// Generate a lobby id, retrying on collision with live ids. The
    /// id space (36^6) makes retries effectively unreachable.
    fn generate_unique_id(&self) -> String {
        loop {
            let id = generate_lobby_id();
            if !self.lobbies.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Short opaque lobby id: 6 uppercase alphanumeric characters.
pub fn generate_lobby_id() -> String {
    let mut rng = rand::rng();
    (0..LOBBY_ID_LEN)
        .map(|_| LOBBY_ID_ALPHABET[rng.random_range(0..LOBBY_ID_ALPHABET.len())] as char)
        .collect()
}
