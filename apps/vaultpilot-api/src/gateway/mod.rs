//! Real-time WebSocket gateway for VaultPilot clients.

pub mod connection;
pub mod events;
pub mod heartbeat;
pub mod notify;
pub mod registry;
pub mod router;
pub mod server;

use std::sync::Arc;

use crate::agents::AgentRegistry;

use connection::{ConnectionId, ConnectionSink};
use events::OutboundEvent;
use heartbeat::{HeartbeatMonitor, HeartbeatSettings};
use registry::ConnectionRegistry;
use router::MessageRouter;

/// One gateway instance: registry, router and heartbeat monitor sharing
/// the same connection state. Built once by the server and handed to every
/// connection task through `AppState`.
pub struct Gateway {
    registry: Arc<ConnectionRegistry>,
    router: Arc<MessageRouter>,
    heartbeat: Arc<HeartbeatMonitor>,
}

impl Gateway {
    pub fn new(agents: Arc<dyn AgentRegistry>, settings: HeartbeatSettings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(MessageRouter::new(registry.clone(), agents, settings.send_timeout));
        let heartbeat = Arc::new(HeartbeatMonitor::new(registry.clone(), settings));
        Self {
            registry,
            router,
            heartbeat,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn heartbeat(&self) -> &Arc<HeartbeatMonitor> {
        &self.heartbeat
    }

    /// Register an accepted connection, make sure the heartbeat monitor is
    /// running, and send the `connection` welcome event.
    pub async fn connect(
        &self,
        sink: Arc<dyn ConnectionSink>,
        channel: &str,
        user_id: Option<String>,
    ) -> ConnectionId {
        let id = self.registry.register(sink, channel, user_id);
        self.heartbeat.ensure_started();

        let welcome = OutboundEvent::connection(channel, &id);
        if let Err(err) = self.router.send_to(&id, &welcome).await {
            tracing::debug!(connection_id = %id, error = %err, "failed to send welcome");
        }
        id
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        self.registry.unregister(id).is_some()
    }

    /// Stop the heartbeat monitor, wait for it, then drop every remaining
    /// connection so their socket tasks exit.
    pub async fn shutdown(&self) {
        self.heartbeat.shutdown().await;
        let remaining = self.registry.snapshot_all();
        for connection in &remaining {
            self.registry.unregister(connection.id());
        }
        if !remaining.is_empty() {
            tracing::info!(count = remaining.len(), "closed connections on shutdown");
        }
    }
}
