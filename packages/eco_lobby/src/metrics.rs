//! Server metrics for observability
//!
//! Runtime counters for monitoring connection and lobby activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Currently active WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    /// WebSocket messages received from clients
    pub messages_received: AtomicU64,
    /// WebSocket messages sent to clients
    pub messages_sent: AtomicU64,
    /// Messages dropped due to backpressure or closed channels
    pub messages_dropped: AtomicU64,

    /// Lobbies created since server start
    pub lobbies_created: AtomicU64,
    /// Lobbies reclaimed by the reaper
    pub lobbies_reaped: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lobby_created(&self) {
        self.lobbies_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lobby_reaped(&self) {
        self.lobbies_reaped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.messages_received.load(Ordering::Relaxed),
                sent: self.messages_sent.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
            },
            lobbies: LobbyMetrics {
                created: self.lobbies_created.load(Ordering::Relaxed),
                reaped: self.lobbies_reaped.load(Ordering::Relaxed),
            },
            uptime_secs: self
                .start_time
                .map(|t| t.elapsed().as_secs())
                .unwrap_or(0),
        }
    }
}

/// Point-in-time view of all metrics (for the /metrics endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub lobbies: LobbyMetrics,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub sent: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyMetrics {
    pub created: u64,
    pub reaped: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub lobbies: u64,
    pub connections: u64,
    pub uptime_secs: u64,
}
