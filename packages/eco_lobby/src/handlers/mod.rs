pub mod health;
pub mod lobbies;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use health::{health_handler, health_live_handler, health_ready_handler, metrics_handler};
pub use lobbies::list_lobbies_handler;
pub use websocket::lobby_websocket_handler;
