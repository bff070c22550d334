//! Lobby WebSocket layer
//!
//! One WebSocket connection per client. Inbound frames are dispatched
//! through the shared router, which resolves each event into a fan-out
//! (sender only, lobby, lobby-minus-sender, or everyone) and pushes
//! outbound messages back through per-connection channels.

mod handler;
mod protocol;
mod router;

pub use handler::handle_lobby_ws;
pub use protocol::ClientMessage;
pub use router::LobbyRouter;
