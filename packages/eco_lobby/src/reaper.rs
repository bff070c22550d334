//! Reaper
//!
//! Periodic sweep that deletes lobbies left empty beyond the grace
//! period. No notification is needed: an empty lobby has no bound
//! connections. Safe to run concurrently with joins and disconnects —
//! the sweep takes the same router lock as every other event.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::ws::LobbyRouter;

pub fn spawn_reaper(router: Arc<LobbyRouter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would sweep an empty registry.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reaped = router.sweep(Utc::now()).await;
            if reaped > 0 {
                info!("Reaped {} abandoned lobbies", reaped);
            }
        }
    })
}
