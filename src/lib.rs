//! Duel Arena Server - authoritative two-player arena over WebSocket
//!
//! - `game`: entity registry, physics, combat and the session lifecycle
//! - `matchmaking`: waiting queue and the single-owner arena loop
//! - `ws` / `http`: the wire protocol and the axum surface

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod util;
pub mod ws;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::matchmaking::ArenaService;

/// Serve the arena on an already bound listener until `shutdown` resolves
pub async fn run<F>(listener: TcpListener, config: Config, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (arena, handle) = ArenaService::new(&config);
    let arena_task = tokio::spawn(arena.run());

    let router = build_router(AppState::new(config, handle));

    let addr = listener.local_addr()?;
    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    arena_task.abort();
    Ok(())
}
