#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use vaultpilot_api::config::Config;
use vaultpilot_api::AppState;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Config with a heartbeat slow enough to stay out of the way.
pub fn quiet_config() -> Config {
    Config {
        heartbeat_interval: Duration::from_secs(300),
        heartbeat_timeout: Duration::from_secs(600),
        ..Config::default()
    }
}

/// Config with a one-second heartbeat and two-second idle timeout.
pub fn fast_heartbeat_config() -> Config {
    Config {
        heartbeat_interval: Duration::from_secs(1),
        heartbeat_timeout: Duration::from_secs(2),
        heartbeat_send_timeout: Duration::from_secs(1),
        monitor_backoff: Duration::from_millis(100),
        ..Config::default()
    }
}

pub fn test_app(config: Config) -> (Router, AppState) {
    let state = AppState::new(config);
    let app = vaultpilot_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing.
pub async fn start_ws_server(config: Config) -> (SocketAddr, AppState) {
    let (app, state) = test_app(config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Connect to `path` and consume the `connection` welcome event.
pub async fn connect(addr: SocketAddr, path: &str) -> (WsClient, serde_json::Value) {
    let url = format!("ws://{addr}{path}");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    let welcome = recv_json(&mut ws).await;
    assert_eq!(welcome["type"], "connection");
    (ws, welcome)
}

pub async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    send_text(ws, &value.to_string()).await;
}

pub async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(tungstenite::Message::Text(text.to_string().into()))
        .await
        .expect("ws send");
}

/// Next text frame as JSON. Fails after five seconds.
pub async fn recv_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        if let tungstenite::Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("frame is json");
        }
    }
}

/// Assert nothing arrives within `wait`.
pub async fn assert_silent(ws: &mut WsClient, wait: Duration) {
    if let Ok(Some(Ok(msg))) = time::timeout(wait, ws.next()).await {
        panic!("unexpected frame: {msg:?}");
    }
}

/// Poll until the registry reports `expected` live connections.
pub async fn wait_for_count(state: &AppState, expected: usize) {
    time::timeout(Duration::from_secs(5), async {
        while state.gateway.registry().count(None) != expected {
            time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("connection count never settled");
}
