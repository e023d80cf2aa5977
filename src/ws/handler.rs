//! WebSocket upgrade handler

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use axum_extra::{headers, TypedHeader};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::matchmaking::ArenaHandle;
use crate::util::rate_limit::InputRateLimiter;
use crate::ws::protocol::ClientMsg;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    State(state): State<AppState>,
) -> Response {
    let agent = user_agent
        .map(|TypedHeader(agent)| agent.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    debug!(user_agent = %agent, "WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection = match state.arena.connect().await {
        Ok(connection) => connection,
        Err(e) => {
            error!(error = %e, "Rejecting socket");
            return;
        }
    };
    let player_id = connection.player_id;

    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    let mut writer = tokio::spawn(write_loop(
        player_id.clone(),
        ws_sink,
        connection.outbound_rx,
        state.config.send_timeout,
    ));
    let mut reader = tokio::spawn(read_loop(
        player_id.clone(),
        ws_stream,
        state.arena.clone(),
        InputRateLimiter::new(state.config.input_rate_limit),
    ));

    // Whichever side finishes first takes the other down with it
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    state.arena.disconnect(&player_id).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Arena frames -> WebSocket
async fn write_loop(
    player_id: String,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<String>,
    send_timeout: Duration,
) {
    while let Some(text) = outbound_rx.recv().await {
        match tokio::time::timeout(send_timeout, ws_sink.send(Message::Text(text))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
            Err(_) => {
                warn!(player_id = %player_id, "WebSocket send timed out");
                break;
            }
        }
    }

    let _ = ws_sink.close().await;
}

/// WebSocket -> arena commands
async fn read_loop(
    player_id: String,
    mut ws_stream: SplitStream<WebSocket>,
    arena: ArenaHandle,
    rate_limiter: InputRateLimiter,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                match ClientMsg::parse(&text) {
                    Ok(msg) => {
                        if arena.command(&player_id, msg).await.is_err() {
                            debug!(player_id = %player_id, "Arena closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Discarding client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}
