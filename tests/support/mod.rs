// Shared helpers for booting a server and talking to it over WebSocket.
use std::{net::SocketAddr, time::Duration};

use duel_arena_server::config::Config;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Upper bound for any single wait on the server.
const WAIT: Duration = Duration::from_secs(3);

// Arena config with no obstacles so entity counts are predictable.
pub fn test_config() -> Config {
    Config {
        obstacle_count: 0,
        ..Config::default()
    }
}

// Start a fresh server on an ephemeral port inside the current test runtime.
pub async fn spawn_server(config: Config) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        duel_arena_server::run(listener, config, std::future::pending())
            .await
            .expect("server failed");
    });
    addr
}

// Open a socket and return it together with the id from the welcome frame.
pub async fn connect(addr: SocketAddr) -> (Client, String) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket handshake");
    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["type"], "welcome");
    let player_id = welcome["player_id"]
        .as_str()
        .expect("welcome carries player_id")
        .to_string();
    (ws, player_id)
}

pub async fn send_text(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.to_string()))
        .await
        .expect("send frame");
}

// Next text frame parsed as JSON.
pub async fn next_json(ws: &mut Client) -> serde_json::Value {
    tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text).expect("server sends json")
                }
                Some(Ok(_)) => continue,
                other => panic!("socket ended: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a frame")
}

// Skip frames until one satisfies `pred`.
pub async fn wait_for<F>(ws: &mut Client, pred: F) -> serde_json::Value
where
    F: Fn(&serde_json::Value) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let frame = next_json(ws).await;
            if pred(&frame) {
                return frame;
            }
        }
    })
    .await
    .expect("timed out waiting for a matching frame")
}
