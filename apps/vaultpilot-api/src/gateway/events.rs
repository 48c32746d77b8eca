//! Gateway event types and wire-format messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vaultpilot_common::time::iso_now;

use super::connection::ConnectionId;

/// Capability names advertised to clients in `handshake_ack`.
pub const SERVER_CAPABILITIES: &[&str] = &[
    "chat",
    "workflow_progress",
    "copilot",
    "vault_sync",
    "intent_debug",
    "heartbeat",
];

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Outbound event type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Connection,
    HandshakeAck,
    Pong,
    Heartbeat,
    Status,
    Chat,
    WorkflowProgress,
    Copilot,
    VaultSync,
    IntentDebug,
    Error,
}

impl EventType {
    pub const ALL: [EventType; 11] = [
        EventType::Connection,
        EventType::HandshakeAck,
        EventType::Pong,
        EventType::Heartbeat,
        EventType::Status,
        EventType::Chat,
        EventType::WorkflowProgress,
        EventType::Copilot,
        EventType::VaultSync,
        EventType::IntentDebug,
        EventType::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Connection => "connection",
            EventType::HandshakeAck => "handshake_ack",
            EventType::Pong => "pong",
            EventType::Heartbeat => "heartbeat",
            EventType::Status => "status",
            EventType::Chat => "chat",
            EventType::WorkflowProgress => "workflow_progress",
            EventType::Copilot => "copilot",
            EventType::VaultSync => "vault_sync",
            EventType::IntentDebug => "intent_debug",
            EventType::Error => "error",
        }
    }
}

/// A message sent from the server to a client.
///
/// Serialized as `{ "type", "data", "timestamp" }`. Fields are private so an
/// event cannot change between construction and delivery; build a new one
/// instead.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEvent {
    #[serde(rename = "type")]
    event_type: EventType,
    data: Value,
    timestamp: String,
}

impl OutboundEvent {
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            event_type,
            data,
            timestamp: iso_now(),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Welcome message sent once a connection is registered.
    pub fn connection(vault_id: &str, connection_id: &ConnectionId) -> Self {
        Self::new(
            EventType::Connection,
            serde_json::json!({
                "status": "connected",
                "vault_id": vault_id,
                "connection_id": connection_id,
                "timestamp": iso_now(),
            }),
        )
    }

    pub fn handshake_ack(connection_id: &ConnectionId, agents: Value) -> Self {
        Self::new(
            EventType::HandshakeAck,
            serde_json::json!({
                "accepted": true,
                "connection_id": connection_id,
                "capabilities": SERVER_CAPABILITIES,
                "agents": agents,
            }),
        )
    }

    pub fn pong(connection_id: &ConnectionId) -> Self {
        Self::new(
            EventType::Pong,
            serde_json::json!({
                "timestamp": iso_now(),
                "connection_id": connection_id,
            }),
        )
    }

    pub fn heartbeat(connection_id: &ConnectionId) -> Self {
        Self::new(
            EventType::Heartbeat,
            serde_json::json!({
                "timestamp": iso_now(),
                "connection_id": connection_id,
            }),
        )
    }

    pub fn status(vault_id: &str, connections: usize) -> Self {
        Self::new(
            EventType::Status,
            serde_json::json!({
                "vault_id": vault_id,
                "connections": connections,
                "timestamp": iso_now(),
            }),
        )
    }

    /// `files` is relayed exactly as the client sent it.
    pub fn vault_sync(files: Value) -> Self {
        Self::new(
            EventType::VaultSync,
            serde_json::json!({
                "action": "content_updated",
                "files": files,
                "timestamp": iso_now(),
            }),
        )
    }

    /// Error event. `received` echoes the offending client message, if any.
    pub fn error(message: impl Into<String>, received: Option<Value>) -> Self {
        let mut data = serde_json::json!({
            "message": message.into(),
            "timestamp": iso_now(),
        });
        if let Some(received) = received {
            data["received_message"] = received;
        }
        Self::new(EventType::Error, data)
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A message received from the client. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: Value,
}

/// Recognised inbound message types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundType {
    Handshake,
    Ping,
    Pong,
    HeartbeatResponse,
    VaultUpdate,
    RequestStatus,
    Unknown(String),
}

impl From<&str> for InboundType {
    fn from(value: &str) -> Self {
        match value {
            "handshake" => InboundType::Handshake,
            "ping" => InboundType::Ping,
            "pong" => InboundType::Pong,
            "heartbeat_response" => InboundType::HeartbeatResponse,
            "vault_update" => InboundType::VaultUpdate,
            "request_status" => InboundType::RequestStatus,
            other => InboundType::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_serializes_snake_case() {
        for event_type in EventType::ALL {
            let value = serde_json::to_value(event_type).unwrap();
            assert_eq!(value, event_type.as_str());
        }
    }

    #[test]
    fn outbound_frame_has_envelope_shape() {
        let event = OutboundEvent::new(EventType::Chat, serde_json::json!({ "a": 1 }));
        let frame: Value = serde_json::from_str(&event.to_frame().unwrap()).unwrap();
        let obj = frame.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(frame["type"], "chat");
        assert_eq!(frame["data"]["a"], 1);
        assert!(chrono::DateTime::parse_from_rfc3339(frame["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn error_event_echoes_received_message() {
        let received = serde_json::json!({ "type": "bogus" });
        let event = OutboundEvent::error("Unknown message type: bogus", Some(received.clone()));
        assert_eq!(event.event_type(), EventType::Error);
        let frame = serde_json::to_value(&event).unwrap();
        assert_eq!(frame["data"]["message"], "Unknown message type: bogus");
        assert_eq!(frame["data"]["received_message"], received);
    }

    #[test]
    fn error_event_without_received_message() {
        let event = OutboundEvent::error("Invalid JSON message", None);
        let frame = serde_json::to_value(&event).unwrap();
        assert!(frame["data"].get("received_message").is_none());
    }

    #[test]
    fn client_message_data_defaults_to_null() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping","extra":true}"#).unwrap();
        assert_eq!(msg.message_type, "ping");
        assert!(msg.data.is_null());
    }

    #[test]
    fn client_message_requires_type() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn inbound_type_parses_known_and_unknown() {
        assert_eq!(InboundType::from("ping"), InboundType::Ping);
        assert_eq!(InboundType::from("heartbeat_response"), InboundType::HeartbeatResponse);
        assert_eq!(InboundType::from("bogus"), InboundType::Unknown("bogus".to_string()));
    }

    #[test]
    fn vault_sync_relays_files_verbatim() {
        let event = OutboundEvent::vault_sync(serde_json::json!("notes/today.md"));
        let frame = serde_json::to_value(&event).unwrap();
        assert_eq!(frame["data"]["files"], "notes/today.md");
        assert_eq!(frame["data"]["action"], "content_updated");
    }
}
