//! WebSocket upgrade routes and the per-connection read loop.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use serde::Deserialize;

use crate::AppState;

use super::connection::{ConnectionId, WsSink};
use super::registry::{ConnectionRegistry, DEFAULT_CHANNEL};

/// Connection parameters accepted on the query string.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub vault_id: Option<String>,
    pub user_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_upgrade))
        // Aliases used by older plugin builds.
        .route("/ws/obsidian", get(ws_upgrade_default))
        .route("/ws/agent", get(ws_upgrade_default))
        .route("/ws/{vault_id}", get(ws_upgrade_vault))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    let channel = channel_or_default(params.vault_id);
    ws.on_upgrade(move |socket| handle_connection(socket, state, channel, params.user_id))
}

async fn ws_upgrade_vault(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(vault_id): Path<String>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    let channel = channel_or_default(Some(vault_id));
    ws.on_upgrade(move |socket| handle_connection(socket, state, channel, params.user_id))
}

async fn ws_upgrade_default(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        handle_connection(socket, state, DEFAULT_CHANNEL.to_string(), params.user_id)
    })
}

fn channel_or_default(vault_id: Option<String>) -> String {
    vault_id
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CHANNEL.to_string())
}

/// One inbound frame, classified.
#[derive(Debug)]
enum Inbound {
    Text(String),
    Binary(Bytes),
    /// Ping/pong control frame; counts as activity, nothing to dispatch.
    Skip,
    Closed,
    Failed(axum::Error),
}

impl From<Option<Result<Message, axum::Error>>> for Inbound {
    fn from(frame: Option<Result<Message, axum::Error>>) -> Self {
        match frame {
            Some(Ok(Message::Text(text))) => Inbound::Text(text.to_string()),
            Some(Ok(Message::Binary(bytes))) => Inbound::Binary(bytes),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => Inbound::Skip,
            Some(Ok(Message::Close(_))) | None => Inbound::Closed,
            Some(Err(err)) => Inbound::Failed(err),
        }
    }
}

/// Unregisters the connection when the socket task ends, on every path.
struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}

async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    channel: String,
    user_id: Option<String>,
) {
    let (ws_tx, mut ws_rx) = socket.split();
    let gateway = state.gateway.clone();

    let id = gateway
        .connect(Arc::new(WsSink::new(ws_tx)), &channel, user_id.clone())
        .await;
    let _guard = ConnectionGuard {
        registry: gateway.registry().clone(),
        id: id.clone(),
    };
    let Some(closed) = gateway.registry().get(&id).map(|c| c.closed()) else {
        return;
    };

    tracing::info!(
        connection_id = %id,
        vault_id = %channel,
        user_id = ?user_id,
        "gateway connection established"
    );

    let router = gateway.router().clone();
    loop {
        let frame = tokio::select! {
            _ = closed.cancelled() => {
                tracing::debug!(connection_id = %id, "connection removed by server");
                break;
            }
            frame = ws_rx.next() => Inbound::from(frame),
        };

        let handled = match frame {
            Inbound::Text(text) => router.handle_text(&id, &text).await,
            Inbound::Binary(bytes) => router.handle_binary(&id, &bytes).await,
            Inbound::Skip => {
                gateway.registry().touch(&id);
                Ok(())
            }
            Inbound::Closed => break,
            Inbound::Failed(err) => {
                tracing::debug!(connection_id = %id, ?err, "ws read error");
                break;
            }
        };
        if let Err(err) = handled {
            tracing::debug!(connection_id = %id, error = %err, "reply failed, closing");
            break;
        }
    }

    tracing::info!(
        connection_id = %id,
        vault_id = %channel,
        "gateway connection ended"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_vault_falls_back_to_default() {
        assert_eq!(channel_or_default(None), DEFAULT_CHANNEL);
        assert_eq!(channel_or_default(Some("  ".to_string())), DEFAULT_CHANNEL);
        assert_eq!(channel_or_default(Some("vault-A".to_string())), "vault-A");
    }

    #[test]
    fn inbound_classification() {
        assert!(matches!(
            Inbound::from(Some(Ok(Message::Text("hi".into())))),
            Inbound::Text(t) if t == "hi"
        ));
        assert!(matches!(Inbound::from(None), Inbound::Closed));
        assert!(matches!(Inbound::from(Some(Ok(Message::Close(None)))), Inbound::Closed));
        assert!(matches!(
            Inbound::from(Some(Ok(Message::Ping(Bytes::new())))),
            Inbound::Skip
        ));
        assert!(matches!(
            Inbound::from(Some(Ok(Message::Binary(Bytes::from_static(b"{}"))))),
            Inbound::Binary(b) if &b[..] == b"{}"
        ));
        assert!(matches!(
            Inbound::from(Some(Err(axum::Error::new("boom")))),
            Inbound::Failed(_)
        ));
    }
}
