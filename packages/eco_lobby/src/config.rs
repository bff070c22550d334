use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [lobby]
//                    max_players = 4
//
//   env var:         ECO_LOBBY__MAX_PLAYERS=4   (double underscore = nesting)
//
// The bare `PORT` env var is also honored and maps to `server.port`.

pub const DEFAULT_PORT: u16 = 3000;

/// What happens when the last player leaves a lobby.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyLobbyPolicy {
    /// Retain the lobby until the reaper finds it empty beyond the
    /// grace period (default).
    #[default]
    Grace,
    /// Delete the lobby as soon as it empties.
    Immediate,
}

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub lobby: LobbyFileConfig,
}

/// Listener tunables (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Directory of SPA assets to serve; disabled when unset.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

/// Lobby coordination tunables (lives under `[lobby]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LobbyFileConfig {
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    #[serde(default)]
    pub empty_lobby_policy: EmptyLobbyPolicy,
}

impl Default for LobbyFileConfig {
    fn default() -> Self {
        Self {
            max_players: default_max_players(),
            grace_secs: default_grace_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            empty_lobby_policy: EmptyLobbyPolicy::default(),
        }
    }
}

fn default_max_players() -> usize {
    6
}
fn default_grace_secs() -> u64 {
    30 * 60
}
fn default_reap_interval_secs() -> u64 {
    5 * 60
}

/// Build a figment that layers: defaults → config.toml → ECO_* env vars
/// → the bare PORT env var.
///
/// Env vars use double-underscore for nesting into sections:
///   `ECO_SERVER__PORT=8080`        →  `server.port = 8080`
///   `ECO_LOBBY__MAX_PLAYERS=4`     →  `lobby.max_players = 4`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("ECO_").split("__"))
        .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Lobby coordination configuration (runtime view).
#[derive(Clone, Debug)]
pub struct LobbyConfig {
    /// Per-lobby capacity, fixed at lobby creation
    pub max_players: usize,
    /// How long an empty lobby survives before the reaper may delete it
    pub grace: chrono::Duration,
    /// Reaper tick interval
    pub reap_interval: Duration,
    pub empty_lobby_policy: EmptyLobbyPolicy,
}

impl LobbyConfig {
    pub fn from_file(fc: &LobbyFileConfig) -> Self {
        Self {
            max_players: fc.max_players,
            grace: chrono::Duration::seconds(fc.grace_secs as i64),
            reap_interval: Duration::from_secs(fc.reap_interval_secs),
            empty_lobby_policy: fc.empty_lobby_policy,
        }
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self::from_file(&LobbyFileConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_file_config_defaults() {
        let d = LobbyFileConfig::default();
        assert_eq!(d.max_players, 6);
        assert_eq!(d.grace_secs, 1800);
        assert_eq!(d.reap_interval_secs, 300);
        assert_eq!(d.empty_lobby_policy, EmptyLobbyPolicy::Grace);
    }

    #[test]
    fn lobby_config_from_file() {
        let fc = LobbyFileConfig {
            max_players: 4,
            grace_secs: 60,
            reap_interval_secs: 10,
            empty_lobby_policy: EmptyLobbyPolicy::Immediate,
        };
        let lc = LobbyConfig::from_file(&fc);
        assert_eq!(lc.max_players, 4);
        assert_eq!(lc.grace, chrono::Duration::seconds(60));
        assert_eq!(lc.reap_interval, Duration::from_secs(10));
        assert_eq!(lc.empty_lobby_policy, EmptyLobbyPolicy::Immediate);
    }

    #[test]
    fn load_config_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert!(fc.server.host.is_none());
        assert!(fc.server.port.is_none());
        assert_eq!(fc.lobby.max_players, 6);
    }

    #[test]
    fn load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[server]\nhost = \"0.0.0.0\"\nport = 8080\n\n[lobby]\nmax_players = 4\nempty_lobby_policy = \"immediate\"\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc.server.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(fc.server.port, Some(8080));
        assert_eq!(fc.lobby.max_players, 4);
        assert_eq!(fc.lobby.empty_lobby_policy, EmptyLobbyPolicy::Immediate);
    }

    #[test]
    fn policy_parses_lowercase() {
        let p: EmptyLobbyPolicy = serde_json::from_str("\"grace\"").unwrap();
        assert_eq!(p, EmptyLobbyPolicy::Grace);
        let p: EmptyLobbyPolicy = serde_json::from_str("\"immediate\"").unwrap();
        assert_eq!(p, EmptyLobbyPolicy::Immediate);
    }
}
