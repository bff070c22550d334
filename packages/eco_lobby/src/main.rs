use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod handlers;
mod metrics;
mod models;
mod reaper;
mod registry;
mod ws;

use crate::config::{DEFAULT_PORT, FileConfig, LobbyConfig};
use crate::metrics::ServerMetrics;
use crate::ws::LobbyRouter;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "eco-lobby")]
#[command(about = "Realtime lobby coordinator for the eco-city game")]
struct Cli {
    /// Port for the web server (overrides config.toml and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Directory of SPA assets to serve (enables the static fallback)
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Directory holding config.toml (defaults to cwd)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub router: Arc<LobbyRouter>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "eco_lobby=debug,tower_http=debug,info"
    } else {
        "eco_lobby=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting Eco Lobby - realtime session coordinator");

    // Layered config: defaults -> config.toml -> ECO_* env -> PORT env.
    // CLI flags win over all of them.
    let data_dir = cli.data_dir.unwrap_or_else(|| PathBuf::from("."));
    let file_config: FileConfig = config::load_config(&data_dir)
        .extract()
        .context("Failed to load configuration")?;

    let host = cli
        .host
        .or(file_config.server.host.clone())
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let port = cli.port.or(file_config.server.port).unwrap_or(DEFAULT_PORT);
    let static_dir = cli.static_dir.or(file_config.server.static_dir.clone());

    let lobby_config = LobbyConfig::from_file(&file_config.lobby);
    info!(
        "Lobby config: max_players={}, grace={}s, reap_interval={}s, empty_lobby_policy={:?}",
        lobby_config.max_players,
        lobby_config.grace.num_seconds(),
        lobby_config.reap_interval.as_secs(),
        lobby_config.empty_lobby_policy,
    );

    let metrics = Arc::new(ServerMetrics::new());
    let router = Arc::new(LobbyRouter::new(lobby_config.clone(), metrics.clone()));

    // Background sweep of abandoned lobbies
    reaper::spawn_reaper(router.clone(), lobby_config.reap_interval);

    let app_state = AppState {
        router,
        metrics,
    };

    // Build routes
    let app = Router::new()
        // Lobby routes
        .route("/api/lobbies", get(handlers::list_lobbies_handler))
        .route("/api/ws", get(handlers::lobby_websocket_handler))
        // Health endpoints
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/health/ready", get(handlers::health_ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Serve the game client as a SPA when a static dir is configured
    let app = match static_dir {
        Some(dir) if dir.is_dir() => {
            info!("Serving static assets from {}", dir.display());
            let index = ServeFile::new(dir.join("index.html"));
            app.fallback_service(ServeDir::new(&dir).not_found_service(index))
        }
        Some(dir) => {
            warn!("Static dir {} does not exist, skipping", dir.display());
            app
        }
        None => app,
    };

    let addr = format!("{host}:{port}").parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Eco Lobby listening on http://{}", actual_addr);
    info!("API endpoints:");
    info!("  GET /api/lobbies - List open lobbies");
    info!("  GET /api/ws      - WebSocket connection for lobby events");

    // Create shutdown signal handler
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received shutdown signal, cleaning up...");
    };

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}
