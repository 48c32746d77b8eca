//! Inbound message dispatch and outbound fan-out.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::agents::AgentRegistry;

use super::connection::{Connection, ConnectionId, SendError};
use super::events::{ClientMessage, EventType, InboundType, OutboundEvent};
use super::registry::ConnectionRegistry;

/// Routes client messages to handlers and events to connections.
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    agents: Arc<dyn AgentRegistry>,
    /// Upper bound on any single outbound send.
    send_timeout: Duration,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        agents: Arc<dyn AgentRegistry>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            agents,
            send_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Send one event to one connection. Activity is recorded on success.
    pub async fn send_to(&self, id: &ConnectionId, event: &OutboundEvent) -> Result<(), SendError> {
        let connection = self.registry.get(id).ok_or(SendError::Closed)?;
        self.deliver(&connection, event).await
    }

    /// Send to every connection in `channel` at call time. A connection
    /// whose send fails is unregistered and the broadcast continues.
    /// Returns the number of successful deliveries.
    pub async fn broadcast_to_channel(&self, channel: &str, event: &OutboundEvent) -> usize {
        let mut delivered = 0;
        for connection in self.registry.snapshot(channel) {
            match self.deliver(&connection, event).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!(
                        connection_id = %connection.id(),
                        vault_id = %channel,
                        event_type = event.event_type().as_str(),
                        error = %err,
                        "broadcast send failed, removing connection"
                    );
                    self.registry.unregister(connection.id());
                }
            }
        }
        delivered
    }

    /// Broadcast to the channel the user is currently associated with.
    /// No-op if the user has no session.
    pub async fn broadcast_to_user(&self, user_id: &str, event: &OutboundEvent) -> usize {
        match self.registry.user_channel(user_id) {
            Some(channel) => self.broadcast_to_channel(&channel, event).await,
            None => 0,
        }
    }

    pub async fn broadcast_to_all(&self, event: &OutboundEvent) -> usize {
        let mut delivered = 0;
        for channel in self.registry.channels() {
            delivered += self.broadcast_to_channel(&channel, event).await;
        }
        delivered
    }

    pub async fn send_chat_update(&self, channel: &str, data: Value) -> usize {
        self.broadcast_to_channel(channel, &OutboundEvent::new(EventType::Chat, data))
            .await
    }

    pub async fn send_workflow_progress(&self, channel: &str, data: Value) -> usize {
        self.broadcast_to_channel(channel, &OutboundEvent::new(EventType::WorkflowProgress, data))
            .await
    }

    pub async fn send_copilot_suggestion(&self, channel: &str, data: Value) -> usize {
        self.broadcast_to_channel(channel, &OutboundEvent::new(EventType::Copilot, data))
            .await
    }

    pub async fn send_vault_sync(&self, channel: &str, data: Value) -> usize {
        self.broadcast_to_channel(channel, &OutboundEvent::new(EventType::VaultSync, data))
            .await
    }

    pub async fn send_intent_debug(&self, channel: &str, data: Value) -> usize {
        self.broadcast_to_channel(channel, &OutboundEvent::new(EventType::IntentDebug, data))
            .await
    }

    pub async fn send_error(&self, channel: &str, message: &str) -> usize {
        self.broadcast_to_channel(channel, &OutboundEvent::error(message, None))
            .await
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Handle one text frame from `id`.
    ///
    /// Bad JSON and unknown types are answered with an `error` event to the
    /// sender only. An `Err` means the reply could not be sent (or the
    /// connection is no longer registered) and the caller should stop
    /// reading from it.
    pub async fn handle_text(&self, id: &ConnectionId, text: &str) -> Result<(), SendError> {
        let connection = self.registry.get(id).ok_or(SendError::Closed)?;
        connection.touch();

        let raw: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(connection_id = %id, error = %err, "invalid json from client");
                return self
                    .deliver(&connection, &OutboundEvent::error("Invalid JSON message", None))
                    .await;
            }
        };

        let message: ClientMessage = match serde_json::from_value(raw.clone()) {
            Ok(message) => message,
            Err(_) => {
                tracing::debug!(connection_id = %id, "client message without a type");
                let event = OutboundEvent::error("Message must be an object with a string type", Some(raw));
                return self.deliver(&connection, &event).await;
            }
        };

        self.dispatch(&connection, message, raw).await
    }

    /// Handle one binary frame from `id`. UTF-8 payloads are treated as
    /// text; anything else is answered like malformed JSON.
    pub async fn handle_binary(&self, id: &ConnectionId, bytes: &[u8]) -> Result<(), SendError> {
        if let Ok(text) = std::str::from_utf8(bytes) {
            return self.handle_text(id, text).await;
        }

        let connection = self.registry.get(id).ok_or(SendError::Closed)?;
        connection.touch();
        tracing::debug!(connection_id = %id, len = bytes.len(), "non-utf8 binary frame from client");
        self.deliver(&connection, &OutboundEvent::error("Invalid JSON message", None))
            .await
    }

    /// Every outbound send that counts as activity goes through here.
    async fn deliver(&self, connection: &Connection, event: &OutboundEvent) -> Result<(), SendError> {
        connection.send_event(event, self.send_timeout).await?;
        connection.touch();
        Ok(())
    }

    async fn dispatch(
        &self,
        connection: &Arc<Connection>,
        message: ClientMessage,
        raw: Value,
    ) -> Result<(), SendError> {
        match InboundType::from(message.message_type.as_str()) {
            InboundType::Handshake => {
                let agents: Vec<Value> = self
                    .agents
                    .list_agents()
                    .await
                    .into_iter()
                    .map(|agent| {
                        serde_json::json!({
                            "id": agent.id,
                            "name": agent.name,
                            "capabilities": agent.capabilities,
                            "active": agent.active,
                        })
                    })
                    .collect();
                let ack = OutboundEvent::handshake_ack(connection.id(), Value::Array(agents));
                self.deliver(connection, &ack).await
            }
            InboundType::Ping => {
                self.deliver(connection, &OutboundEvent::pong(connection.id()))
                    .await
            }
            // Activity was already recorded.
            InboundType::Pong | InboundType::HeartbeatResponse => Ok(()),
            InboundType::VaultUpdate => {
                let files = message
                    .data
                    .get("files")
                    .cloned()
                    .unwrap_or_else(|| Value::Array(Vec::new()));
                let channel = connection.channel().to_string();
                self.broadcast_to_channel(&channel, &OutboundEvent::vault_sync(files))
                    .await;
                Ok(())
            }
            InboundType::RequestStatus => {
                let channel = connection.channel();
                let status = OutboundEvent::status(channel, self.registry.count(Some(channel)));
                self.deliver(connection, &status).await
            }
            InboundType::Unknown(message_type) => {
                tracing::debug!(
                    connection_id = %connection.id(),
                    %message_type,
                    "unknown message type"
                );
                let event = OutboundEvent::error(format!("Unknown message type: {message_type}"), Some(raw));
                self.deliver(connection, &event).await
            }
        }
    }
}
