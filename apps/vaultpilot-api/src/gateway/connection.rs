//! Per-connection gateway state and the outbound send primitive.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use vaultpilot_common::id::{prefix, prefixed_ulid};

use super::events::OutboundEvent;

/// Unique connection identifier (`conn_` prefixed ULID), assigned at
/// registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(prefixed_ulid(prefix::CONNECTION))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why an outbound send did not reach the client.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to encode event: {0}")]
    Encode(String),
}

/// The low-level text send primitive for one client.
///
/// Implemented by [`WsSink`] for real sockets and by recording doubles in
/// tests.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    async fn send_text(&self, text: String) -> Result<(), SendError>;
}

/// Write half of an axum WebSocket.
pub struct WsSink {
    inner: tokio::sync::Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(sink),
        }
    }
}

#[async_trait]
impl ConnectionSink for WsSink {
    async fn send_text(&self, text: String) -> Result<(), SendError> {
        let mut sink = self.inner.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| SendError::Transport(e.to_string()))
    }
}

/// A live client connection, owned by the registry.
pub struct Connection {
    id: ConnectionId,
    /// Vault the connection is subscribed to.
    channel: String,
    user_id: Option<String>,
    created_at: DateTime<Utc>,
    last_activity: Mutex<Instant>,
    /// Cancelled when the registry drops this connection, so the socket
    /// task can stop reading.
    closed: CancellationToken,
    sink: Arc<dyn ConnectionSink>,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        channel: String,
        user_id: Option<String>,
        sink: Arc<dyn ConnectionSink>,
    ) -> Self {
        Self {
            id,
            channel,
            user_id,
            created_at: Utc::now(),
            last_activity: Mutex::new(Instant::now()),
            closed: CancellationToken::new(),
            sink,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    /// Record activity now.
    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    pub fn touch_at(&self, at: Instant) {
        let mut last = self.last_activity.lock();
        if at > *last {
            *last = at;
        }
    }

    /// Time since the last recorded activity, as seen from `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }

    /// Token cancelled once the connection has been unregistered.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.cancel();
    }

    /// Encode `event` into its `{type, data, timestamp}` envelope and send
    /// it, giving up after `limit`. Does not update activity.
    pub async fn send_event(&self, event: &OutboundEvent, limit: Duration) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        let frame = event.to_frame().map_err(|e| SendError::Encode(e.to_string()))?;
        match time::timeout(limit, self.sink.send_text(frame)).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(limit)),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
