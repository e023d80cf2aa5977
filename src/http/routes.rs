//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::{EntityId, SessionPhase};
use crate::util::time::{unix_millis, uptime_secs};
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(state.config.client_origin.as_deref()))
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

/// Comma-separated origins, or any origin when none are configured
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_time: u64,
    phase: SessionPhase,
    connections: usize,
    queued: usize,
    players: Vec<EntityId>,
    ticks: u64,
    snapshots_sent: u64,
    bytes_sent: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.arena.status();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        server_time: unix_millis(),
        phase: status.phase,
        connections: status.connections,
        queued: status.queued,
        players: status.players,
        ticks: status.ticks,
        snapshots_sent: status.stats.snapshots_sent,
        bytes_sent: status.stats.bytes_sent,
    })
}
