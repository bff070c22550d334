//! Lobby Router
//!
//! Owns the shared coordination state: the lobby registry plus one
//! entry per live connection. Every inbound event locks the single
//! mutex, mutates, and enqueues all resulting outbound messages to the
//! per-connection channels before the lock is released — so each event
//! is atomic with respect to every other and no client ever observes a
//! partially applied transition.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use crate::config::{EmptyLobbyPolicy, LobbyConfig};
use crate::metrics::ServerMetrics;
use crate::models::{JoinRejection, LobbySummary};
use crate::registry::{LobbyRegistry, name_too_short};

use super::protocol::{ClientMessage, ServerMessage};

/// Per-connection sender for outbound messages. Bounded; slow clients
/// are skipped rather than blocking the event path.
pub type OutboundSender = mpsc::Sender<ServerMessage>;

/// Weak back-reference from a connection to its membership. Never
/// trusted: validated against the registry on every use, since the
/// lobby or player may have been removed since it was written.
#[derive(Debug, Clone)]
struct Binding {
    lobby_id: String,
    player_id: String,
}

struct ConnectionEntry {
    sender: OutboundSender,
    binding: Option<Binding>,
}

/// Where an outbound message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Fanout {
    /// The originating connection only
    Sender,
    /// Every member of the lobby, sender included
    Lobby(String),
    /// Every member of the lobby except the sender
    Others(String),
    /// Every live connection, bound or not
    All,
}

type Outbound = (Fanout, ServerMessage);

struct RouterInner {
    registry: LobbyRegistry,
    connections: HashMap<String, ConnectionEntry>,
    config: LobbyConfig,
    metrics: Arc<ServerMetrics>,
}

/// Shared coordination service handed to every connection handler.
pub struct LobbyRouter {
    inner: Mutex<RouterInner>,
    metrics: Arc<ServerMetrics>,
}

impl LobbyRouter {
    pub fn new(config: LobbyConfig, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            inner: Mutex::new(RouterInner {
                registry: LobbyRegistry::new(config.max_players),
                connections: HashMap::new(),
                config,
                metrics: metrics.clone(),
            }),
            metrics,
        }
    }

    /// Register a freshly opened connection's outbound channel.
    pub async fn register(&self, connection_id: &str, sender: OutboundSender) {
        let mut inner = self.inner.lock().await;
        inner.connections.insert(
            connection_id.to_string(),
            ConnectionEntry {
                sender,
                binding: None,
            },
        );
    }

    /// Process one inbound event to completion and deliver its fan-out.
    pub async fn handle(&self, connection_id: &str, msg: ClientMessage) {
        self.metrics.message_received();
        let mut inner = self.inner.lock().await;
        let out = inner.dispatch(connection_id, msg, Utc::now());
        self.deliver(&inner, connection_id, out);
    }

    /// Transport-level disconnect: remove the player (if bound), notify
    /// the remaining lobby members, and drop the connection entry.
    pub async fn disconnect(&self, connection_id: &str) {
        let mut inner = self.inner.lock().await;
        let mut out = inner.unbind(connection_id, Utc::now());
        if !out.is_empty() {
            let lobbies = inner.registry.summaries();
            out.push((Fanout::All, ServerMessage::LobbyUpdated { lobbies }));
        }
        inner.connections.remove(connection_id);
        self.deliver(&inner, connection_id, out);
    }

    /// Reaper entry point: delete lobbies empty beyond the grace
    /// period, as of `now`. Returns the number reclaimed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock().await;
        let grace = inner.config.grace;
        let reaped = inner.registry.sweep(now, grace);
        for _ in 0..reaped {
            self.metrics.lobby_reaped();
        }
        reaped
    }

    /// Registry projection for the HTTP listing endpoint.
    pub async fn summaries(&self) -> Vec<LobbySummary> {
        self.inner.lock().await.registry.summaries()
    }

    pub async fn lobby_count(&self) -> usize {
        self.inner.lock().await.registry.len()
    }

    /// Enqueue each outbound message to its resolved recipients. Called
    /// under the state lock, so all fan-out from one event lands before
    /// the next event is processed.
    fn deliver(&self, inner: &RouterInner, sender_conn: &str, out: Vec<Outbound>) {
        for (fanout, msg) in out {
            for (conn_id, entry) in &inner.connections {
                let member_of = |lobby_id: &str| {
                    entry
                        .binding
                        .as_ref()
                        .is_some_and(|b| b.lobby_id == lobby_id)
                };
                let included = match &fanout {
                    Fanout::Sender => conn_id == sender_conn,
                    Fanout::Lobby(id) => member_of(id),
                    Fanout::Others(id) => member_of(id) && conn_id != sender_conn,
                    Fanout::All => true,
                };
                if !included {
                    continue;
                }
                match entry.sender.try_send(msg.clone()) {
                    Ok(()) => self.metrics.message_sent(),
                    Err(e) => {
                        self.metrics.message_dropped();
                        debug!(conn = %conn_id, error = %e, "Skipping send to slow or closed connection");
                    }
                }
            }
        }
    }
}

impl RouterInner {
    fn dispatch(&mut self, conn_id: &str, msg: ClientMessage, now: DateTime<Utc>) -> Vec<Outbound> {
        match msg {
            ClientMessage::ListLobbies => vec![(
                Fanout::Sender,
                ServerMessage::LobbyList {
                    lobbies: self.registry.summaries(),
                },
            )],
            ClientMessage::JoinLobby {
                lobby_id,
                player_name,
                create_new,
            } => self.handle_join(conn_id, lobby_id, &player_name, create_new, now),
            ClientMessage::ChatMessage { message } => {
                let Some((lobby_id, player)) = self.bound_player(conn_id) else {
                    debug!(conn = %conn_id, "Ignoring chat from unbound connection");
                    return Vec::new();
                };
                vec![(
                    Fanout::Lobby(lobby_id),
                    ServerMessage::ChatBroadcast {
                        player_id: player.id,
                        player_name: player.name,
                        message,
                        timestamp: now,
                    },
                )]
            }
            ClientMessage::UpdateProgress { city_key, progress } => {
                let Some((lobby_id, _)) = self.bound_player(conn_id) else {
                    debug!(conn = %conn_id, "Ignoring progress update from unbound connection");
                    return Vec::new();
                };
                let Some(lobby) = self.registry.get_mut(&lobby_id) else {
                    return Vec::new();
                };
                lobby.city_progress.set(city_key, progress);
                vec![(
                    Fanout::Others(lobby_id),
                    ServerMessage::ProgressUpdated { city_key, progress },
                )]
            }
            ClientMessage::Relay { channel, payload } => {
                let Some((lobby_id, player)) = self.bound_player(conn_id) else {
                    debug!(conn = %conn_id, "Ignoring relay from unbound connection");
                    return Vec::new();
                };
                vec![(
                    Fanout::Others(lobby_id),
                    ServerMessage::PlayerRelay {
                        player_id: player.id,
                        channel,
                        payload,
                    },
                )]
            }
            ClientMessage::Ping => {
                let lobby_id = self.bound_player(conn_id).map(|(id, _)| id);
                vec![(
                    Fanout::Sender,
                    ServerMessage::Pong {
                        server_time: now,
                        lobby_id,
                    },
                )]
            }
        }
    }

    fn handle_join(
        &mut self,
        conn_id: &str,
        lobby_id: Option<String>,
        player_name: &str,
        create_new: bool,
        now: DateTime<Utc>,
    ) -> Vec<Outbound> {
        // Reject bad names before allocating anything.
        if name_too_short(player_name) {
            return vec![(
                Fanout::Sender,
                ServerMessage::JoinError {
                    reason: JoinRejection::NameTooShort,
                },
            )];
        }

        // A connection occupies at most one lobby: surrender any current
        // membership before the switch. The departure is announced to the
        // old lobby even if the new join is then rejected.
        let mut out = self.unbind(conn_id, now);
        let left_previous = !out.is_empty();

        // An unknown id (or an explicit create request) allocates a fresh
        // lobby under a freshly generated id; the requested id is not reused.
        let target_id = match &lobby_id {
            Some(id) if !create_new && self.registry.contains(id) => id.clone(),
            _ => {
                self.metrics.lobby_created();
                self.registry.create(now).id.clone()
            }
        };

        let Some(lobby) = self.registry.get_mut(&target_id) else {
            return out;
        };
        match lobby.join(player_name, conn_id) {
            Err(reason) => {
                out.push((Fanout::Sender, ServerMessage::JoinError { reason }));
                if left_previous {
                    let lobbies = self.registry.summaries();
                    out.push((Fanout::All, ServerMessage::LobbyUpdated { lobbies }));
                }
                out
            }
            Ok(player) => {
                let players = lobby.players_by_id();
                let city_progress = lobby.city_progress.clone();

                if let Some(entry) = self.connections.get_mut(conn_id) {
                    entry.binding = Some(Binding {
                        lobby_id: target_id.clone(),
                        player_id: conn_id.to_string(),
                    });
                }

                out.push((
                    Fanout::Sender,
                    ServerMessage::JoinSuccess {
                        lobby_id: target_id.clone(),
                        player_id: player.id.clone(),
                        player: player.clone(),
                    },
                ));
                out.push((
                    Fanout::Sender,
                    ServerMessage::LobbyState {
                        players,
                        city_progress,
                    },
                ));
                out.push((
                    Fanout::Others(target_id),
                    ServerMessage::PlayerJoined {
                        player_id: player.id.clone(),
                        player,
                    },
                ));
                let lobbies = self.registry.summaries();
                out.push((Fanout::All, ServerMessage::LobbyUpdated { lobbies }));
                out
            }
        }
    }

    /// Remove the connection's membership, if it still resolves against
    /// the registry. Announces the departure to the remaining members
    /// and applies the empty-lobby policy.
    fn unbind(&mut self, conn_id: &str, now: DateTime<Utc>) -> Vec<Outbound> {
        let Some(entry) = self.connections.get_mut(conn_id) else {
            return Vec::new();
        };
        let Some(binding) = entry.binding.take() else {
            return Vec::new();
        };
        let Some(lobby) = self.registry.get_mut(&binding.lobby_id) else {
            // Stale binding: the lobby was already deleted.
            return Vec::new();
        };
        let Some(player) = lobby.leave(&binding.player_id, now) else {
            return Vec::new();
        };
        let emptied = lobby.is_empty();

        if emptied && self.config.empty_lobby_policy == EmptyLobbyPolicy::Immediate {
            self.registry.delete(&binding.lobby_id);
        }

        vec![(
            Fanout::Others(binding.lobby_id),
            ServerMessage::PlayerLeft {
                player_id: player.id,
                player_name: player.name,
            },
        )]
    }

    /// Resolve the connection's binding against the registry. Returns
    /// the lobby id and a snapshot of the player record, or `None` for
    /// unbound or stale bindings.
    fn bound_player(&self, conn_id: &str) -> Option<(String, crate::models::Player)> {
        let binding = self.connections.get(conn_id)?.binding.as_ref()?;
        let lobby = self.registry.get(&binding.lobby_id)?;
        let player = lobby.player(&binding.player_id)?;
        Some((binding.lobby_id.clone(), player.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CityKey, PALETTE};
    use chrono::Duration;
    use serde_json::json;

    fn router() -> LobbyRouter {
        LobbyRouter::new(LobbyConfig::default(), Arc::new(ServerMetrics::new()))
    }

    fn router_with_policy(policy: EmptyLobbyPolicy) -> LobbyRouter {
        let config = LobbyConfig {
            empty_lobby_policy: policy,
            ..LobbyConfig::default()
        };
        LobbyRouter::new(config, Arc::new(ServerMetrics::new()))
    }

    async fn connect(router: &LobbyRouter, conn_id: &str) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(64);
        router.register(conn_id, tx).await;
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    async fn join(router: &LobbyRouter, conn_id: &str, lobby_id: Option<&str>, name: &str) {
        router
            .handle(
                conn_id,
                ClientMessage::JoinLobby {
                    lobby_id: lobby_id.map(str::to_string),
                    player_name: name.to_string(),
                    create_new: lobby_id.is_none(),
                },
            )
            .await;
    }

    /// Join a fresh lobby and return its id from the join_success reply.
    async fn join_fresh(
        router: &LobbyRouter,
        conn_id: &str,
        name: &str,
        rx: &mut mpsc::Receiver<ServerMessage>,
    ) -> String {
        join(router, conn_id, None, name).await;
        let msgs = drain(rx);
        match &msgs[0] {
            ServerMessage::JoinSuccess { lobby_id, .. } => lobby_id.clone(),
            other => panic!("expected join_success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_and_join_flow() {
        let router = router();
        let mut rx_a = connect(&router, "conn-a").await;
        let mut rx_idle = connect(&router, "conn-idle").await;

        join(&router, "conn-a", None, "Alice").await;

        let msgs = drain(&mut rx_a);
        assert_eq!(msgs.len(), 3);
        let lobby_id = match &msgs[0] {
            ServerMessage::JoinSuccess {
                lobby_id,
                player_id,
                player,
            } => {
                assert_eq!(lobby_id.len(), 6);
                assert_eq!(player_id, "conn-a");
                assert_eq!(player.color, PALETTE[0]);
                lobby_id.clone()
            }
            other => panic!("expected join_success, got {other:?}"),
        };
        match &msgs[1] {
            ServerMessage::LobbyState {
                players,
                city_progress,
            } => {
                assert_eq!(players.len(), 1);
                assert!(city_progress.is_all_zero());
            }
            other => panic!("expected lobby_state, got {other:?}"),
        }
        match &msgs[2] {
            ServerMessage::LobbyUpdated { lobbies } => {
                let s = lobbies.iter().find(|s| s.id == lobby_id).unwrap();
                assert_eq!(s.player_count, 1);
                assert_eq!(s.players, vec!["Alice".to_string()]);
            }
            other => panic!("expected lobby_updated, got {other:?}"),
        }

        // Unbound connections still get the projection update, nothing else.
        let idle_msgs = drain(&mut rx_idle);
        assert_eq!(idle_msgs.len(), 1);
        assert!(matches!(idle_msgs[0], ServerMessage::LobbyUpdated { .. }));
    }

    #[tokio::test]
    async fn second_member_notifies_first() {
        let router = router();
        let mut rx_a = connect(&router, "conn-a").await;
        let mut rx_b = connect(&router, "conn-b").await;
        let lobby_id = join_fresh(&router, "conn-a", "Alice", &mut rx_a).await;
        drain(&mut rx_b);

        join(&router, "conn-b", Some(&lobby_id), "Bob").await;

        let a_msgs = drain(&mut rx_a);
        assert!(a_msgs.iter().any(|m| matches!(
            m,
            ServerMessage::PlayerJoined { player, .. } if player.name == "Bob" && player.color == PALETTE[1]
        )));
        let b_msgs = drain(&mut rx_b);
        assert!(matches!(
            &b_msgs[0],
            ServerMessage::JoinSuccess { lobby_id: id, .. } if *id == lobby_id
        ));
    }

    #[tokio::test]
    async fn duplicate_name_rejected_without_mutation() {
        let router = router();
        let mut rx_a = connect(&router, "conn-a").await;
        let mut rx_b = connect(&router, "conn-b").await;
        let lobby_id = join_fresh(&router, "conn-a", "Alice", &mut rx_a).await;
        drain(&mut rx_b);

        join(&router, "conn-b", Some(&lobby_id), "Alice").await;

        let b_msgs = drain(&mut rx_b);
        assert_eq!(b_msgs.len(), 1);
        assert!(matches!(
            b_msgs[0],
            ServerMessage::JoinError {
                reason: JoinRejection::NameTaken
            }
        ));
        // Nothing reached the existing member; lobby unchanged.
        assert!(drain(&mut rx_a).is_empty());
        let summaries = router.summaries().await;
        assert_eq!(summaries[0].player_count, 1);
    }

    #[tokio::test]
    async fn short_name_rejected_before_allocation() {
        let router = router();
        let mut rx = connect(&router, "conn-a").await;
        join(&router, "conn-a", None, " x ").await;
        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(
            msgs[0],
            ServerMessage::JoinError {
                reason: JoinRejection::NameTooShort
            }
        ));
        assert_eq!(router.lobby_count().await, 0);
    }

    #[tokio::test]
    async fn seventh_join_rejected_when_full() {
        let router = router();
        let mut rx_a = connect(&router, "conn-0").await;
        let lobby_id = join_fresh(&router, "conn-0", "Player0", &mut rx_a).await;

        for i in 1..6 {
            let conn = format!("conn-{i}");
            let mut rx = connect(&router, &conn).await;
            join(&router, &conn, Some(&lobby_id), &format!("Player{i}")).await;
            let msgs = drain(&mut rx);
            assert!(matches!(msgs[0], ServerMessage::JoinSuccess { .. }));
        }

        let mut rx_7 = connect(&router, "conn-7").await;
        join(&router, "conn-7", Some(&lobby_id), "Seventh").await;
        let msgs = drain(&mut rx_7);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(
            msgs[0],
            ServerMessage::JoinError {
                reason: JoinRejection::LobbyFull
            }
        ));
        assert_eq!(router.summaries().await[0].player_count, 6);
    }

    #[tokio::test]
    async fn joining_unknown_id_allocates_fresh_lobby() {
        let router = router();
        let mut rx = connect(&router, "conn-a").await;
        router
            .handle(
                "conn-a",
                ClientMessage::JoinLobby {
                    lobby_id: Some("NOSUCH".to_string()),
                    player_name: "Alice".to_string(),
                    create_new: false,
                },
            )
            .await;
        let msgs = drain(&mut rx);
        match &msgs[0] {
            ServerMessage::JoinSuccess { lobby_id, .. } => {
                assert_ne!(lobby_id, "NOSUCH");
                assert_eq!(lobby_id.len(), 6);
            }
            other => panic!("expected join_success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_includes_sender_relay_excludes_sender() {
        let router = router();
        let mut rx_a = connect(&router, "conn-a").await;
        let mut rx_b = connect(&router, "conn-b").await;
        let lobby_id = join_fresh(&router, "conn-a", "Alice", &mut rx_a).await;
        join(&router, "conn-b", Some(&lobby_id), "Bob").await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        router
            .handle(
                "conn-a",
                ClientMessage::ChatMessage {
                    message: "hello".to_string(),
                },
            )
            .await;

        // Chat is lobby-inclusive: the sender sees its own line with the
        // server-assigned timestamp.
        for rx in [&mut rx_a, &mut rx_b] {
            let msgs = drain(rx);
            assert_eq!(msgs.len(), 1);
            match &msgs[0] {
                ServerMessage::ChatBroadcast {
                    player_id,
                    player_name,
                    message,
                    ..
                } => {
                    assert_eq!(player_id, "conn-a");
                    assert_eq!(player_name, "Alice");
                    assert_eq!(message, "hello");
                }
                other => panic!("expected chat_broadcast, got {other:?}"),
            }
        }

        router
            .handle(
                "conn-a",
                ClientMessage::Relay {
                    channel: "dice_roll".to_string(),
                    payload: json!({ "value": 4 }),
                },
            )
            .await;

        // Relay is sender-exclusive: the sender already has its local copy.
        assert!(drain(&mut rx_a).is_empty());
        let b_msgs = drain(&mut rx_b);
        assert_eq!(b_msgs.len(), 1);
        match &b_msgs[0] {
            ServerMessage::PlayerRelay {
                player_id,
                channel,
                payload,
            } => {
                assert_eq!(player_id, "conn-a");
                assert_eq!(channel, "dice_roll");
                assert_eq!(payload["value"], 4);
            }
            other => panic!("expected player_relay, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn progress_update_mutates_and_skips_sender() {
        let router = router();
        let mut rx_a = connect(&router, "conn-a").await;
        let mut rx_b = connect(&router, "conn-b").await;
        let lobby_id = join_fresh(&router, "conn-a", "Alice", &mut rx_a).await;
        join(&router, "conn-b", Some(&lobby_id), "Bob").await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        router
            .handle(
                "conn-a",
                ClientMessage::UpdateProgress {
                    city_key: CityKey::Kazan,
                    progress: 40,
                },
            )
            .await;

        assert!(drain(&mut rx_a).is_empty());
        let b_msgs = drain(&mut rx_b);
        assert!(matches!(
            b_msgs[0],
            ServerMessage::ProgressUpdated {
                city_key: CityKey::Kazan,
                progress: 40
            }
        ));

        // A later joiner sees the mutation in the lobby snapshot.
        let mut rx_c = connect(&router, "conn-c").await;
        join(&router, "conn-c", Some(&lobby_id), "Carol").await;
        let c_msgs = drain(&mut rx_c);
        match &c_msgs[1] {
            ServerMessage::LobbyState { city_progress, .. } => {
                assert_eq!(city_progress.get(CityKey::Kazan), 40);
            }
            other => panic!("expected lobby_state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unbound_session_events_ignored() {
        let router = router();
        let mut rx_a = connect(&router, "conn-a").await;
        let mut rx_b = connect(&router, "conn-b").await;
        join_fresh(&router, "conn-b", "Bob", &mut rx_b).await;
        drain(&mut rx_a);

        router
            .handle(
                "conn-a",
                ClientMessage::ChatMessage {
                    message: "void".to_string(),
                },
            )
            .await;
        router
            .handle(
                "conn-a",
                ClientMessage::UpdateProgress {
                    city_key: CityKey::Tver,
                    progress: 1,
                },
            )
            .await;
        router
            .handle(
                "conn-a",
                ClientMessage::Relay {
                    channel: "dice_roll".to_string(),
                    payload: json!(null),
                },
            )
            .await;

        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn disconnect_notifies_only_that_lobby() {
        let router = router();
        let mut rx_a = connect(&router, "conn-a").await;
        let mut rx_b = connect(&router, "conn-b").await;
        let mut rx_c = connect(&router, "conn-c").await;

        let lobby_one = join_fresh(&router, "conn-a", "Alice", &mut rx_a).await;
        join(&router, "conn-b", Some(&lobby_one), "Bob").await;
        drain(&mut rx_c);
        let lobby_two = join_fresh(&router, "conn-c", "Carol", &mut rx_c).await;
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        router.disconnect("conn-a").await;

        let b_msgs = drain(&mut rx_b);
        assert_eq!(b_msgs.len(), 2);
        assert!(matches!(
            &b_msgs[0],
            ServerMessage::PlayerLeft { player_id, player_name }
                if player_id == "conn-a" && player_name == "Alice"
        ));
        assert!(matches!(b_msgs[1], ServerMessage::LobbyUpdated { .. }));

        // The other lobby only sees the global projection update.
        let c_msgs = drain(&mut rx_c);
        assert_eq!(c_msgs.len(), 1);
        assert!(matches!(c_msgs[0], ServerMessage::LobbyUpdated { .. }));

        let summaries = router.summaries().await;
        assert_eq!(
            summaries.iter().find(|s| s.id == lobby_one).unwrap().player_count,
            1
        );
        assert_eq!(
            summaries.iter().find(|s| s.id == lobby_two).unwrap().player_count,
            1
        );
    }

    #[tokio::test]
    async fn disconnect_of_unbound_connection_is_silent() {
        let router = router();
        let mut rx_a = connect(&router, "conn-a").await;
        let mut rx_b = connect(&router, "conn-b").await;
        join_fresh(&router, "conn-b", "Bob", &mut rx_b).await;
        drain(&mut rx_a);

        router.disconnect("conn-a").await;
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn ping_reports_bound_lobby() {
        let router = router();
        let mut rx = connect(&router, "conn-a").await;

        router.handle("conn-a", ClientMessage::Ping).await;
        let msgs = drain(&mut rx);
        assert!(matches!(
            &msgs[0],
            ServerMessage::Pong { lobby_id: None, .. }
        ));

        let lobby_id = join_fresh(&router, "conn-a", "Alice", &mut rx).await;
        router.handle("conn-a", ClientMessage::Ping).await;
        let msgs = drain(&mut rx);
        assert!(matches!(
            &msgs[0],
            ServerMessage::Pong { lobby_id: Some(id), .. } if *id == lobby_id
        ));
    }

    #[tokio::test]
    async fn immediate_policy_deletes_emptied_lobby() {
        let router = router_with_policy(EmptyLobbyPolicy::Immediate);
        let mut rx = connect(&router, "conn-a").await;
        join_fresh(&router, "conn-a", "Alice", &mut rx).await;
        assert_eq!(router.lobby_count().await, 1);

        router.disconnect("conn-a").await;
        assert_eq!(router.lobby_count().await, 0);
    }

    #[tokio::test]
    async fn grace_policy_retains_until_sweep() {
        let router = router();
        let mut rx = connect(&router, "conn-a").await;
        let lobby_id = join_fresh(&router, "conn-a", "Alice", &mut rx).await;
        router.disconnect("conn-a").await;

        // Still listed until the reaper runs past the grace period.
        assert!(router.summaries().await.iter().any(|s| s.id == lobby_id));
        assert_eq!(router.sweep(Utc::now() + Duration::minutes(29)).await, 0);
        assert_eq!(router.sweep(Utc::now() + Duration::minutes(31)).await, 1);
        assert!(!router.summaries().await.iter().any(|s| s.id == lobby_id));
    }

    #[tokio::test]
    async fn switching_lobbies_leaves_the_previous_one() {
        let router = router();
        let mut rx_a = connect(&router, "conn-a").await;
        let mut rx_b = connect(&router, "conn-b").await;
        let lobby_one = join_fresh(&router, "conn-a", "Alice", &mut rx_a).await;
        join(&router, "conn-b", Some(&lobby_one), "Bob").await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        // Alice moves to a fresh lobby.
        join(&router, "conn-a", None, "Alice").await;

        let b_msgs = drain(&mut rx_b);
        assert!(b_msgs.iter().any(|m| matches!(
            m,
            ServerMessage::PlayerLeft { player_name, .. } if player_name == "Alice"
        )));

        let summaries = router.summaries().await;
        let old = summaries.iter().find(|s| s.id == lobby_one).unwrap();
        assert_eq!(old.players, vec!["Bob".to_string()]);
        assert_eq!(summaries.len(), 2);
    }

    #[tokio::test]
    async fn rejoin_after_disconnect_frees_name() {
        let router = router();
        let mut rx_a = connect(&router, "conn-a").await;
        let lobby_id = join_fresh(&router, "conn-a", "Alice", &mut rx_a).await;
        router.disconnect("conn-a").await;

        let mut rx_a2 = connect(&router, "conn-a2").await;
        join(&router, "conn-a2", Some(&lobby_id), "Alice").await;
        let msgs = drain(&mut rx_a2);
        assert!(matches!(msgs[0], ServerMessage::JoinSuccess { .. }));
    }
}
