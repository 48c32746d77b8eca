//! Connection registry: live connections grouped by vault, plus the
//! user → vault session map.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use super::connection::{Connection, ConnectionId, ConnectionSink};

/// Vault used when a client does not name one.
pub const DEFAULT_CHANNEL: &str = "default";

/// The vault a user is currently associated with, and the connection that
/// set the association.
#[derive(Debug, Clone)]
struct UserSession {
    channel: String,
    connection_id: ConnectionId,
}

/// Shared registry of all live gateway connections.
///
/// The three maps are the only shared mutable gateway state. Readers take
/// snapshots (`Vec<Arc<Connection>>`) and never hold a map guard across an
/// `.await`, so unregistering during a broadcast or heartbeat scan is safe.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    /// Non-empty channel groups only.
    channels: DashMap<String, HashSet<ConnectionId>>,
    users: DashMap<String, UserSession>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to `channel`, creating the group if needed. If
    /// `user_id` is given, the user's session now points at this channel
    /// (last write wins).
    pub fn register(
        &self,
        sink: Arc<dyn ConnectionSink>,
        channel: &str,
        user_id: Option<String>,
    ) -> ConnectionId {
        let id = ConnectionId::generate();
        let connection = Arc::new(Connection::new(
            id.clone(),
            channel.to_string(),
            user_id.clone(),
            sink,
        ));

        self.connections.insert(id.clone(), connection);
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(id.clone());

        if let Some(user_id) = user_id {
            let previous = self.users.insert(
                user_id.clone(),
                UserSession {
                    channel: channel.to_string(),
                    connection_id: id.clone(),
                },
            );
            if let Some(previous) = previous {
                tracing::debug!(
                    %user_id,
                    superseded = %previous.connection_id,
                    previous_vault = %previous.channel,
                    vault_id = %channel,
                    "user session moved to new connection"
                );
            }
        }

        id
    }

    /// Remove a connection. Returns the removed record, or `None` if it was
    /// already gone (unregistering twice is a no-op).
    pub fn unregister(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        let (_, connection) = self.connections.remove(id)?;
        connection.mark_closed();

        let channel = connection.channel();
        if let Some(mut group) = self.channels.get_mut(channel) {
            group.remove(id);
        }
        self.channels.remove_if(channel, |_, group| group.is_empty());

        if let Some(user_id) = connection.user_id() {
            // Only drop the mapping if this connection still owns it.
            self.users
                .remove_if(user_id, |_, session| &session.connection_id == id);
        }

        Some(connection)
    }

    /// Record activity on a connection. Returns `false` if it is unknown.
    pub fn touch(&self, id: &ConnectionId) -> bool {
        match self.connections.get(id) {
            Some(connection) => {
                connection.touch();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    /// Number of connections in `channel`, or across all channels.
    pub fn count(&self, channel: Option<&str>) -> usize {
        match channel {
            Some(channel) => self.channels.get(channel).map_or(0, |group| group.len()),
            None => self.channels.iter().map(|group| group.len()).sum(),
        }
    }

    /// Names of all non-empty channel groups.
    pub fn channels(&self) -> HashSet<String> {
        self.channels
            .iter()
            .filter(|group| !group.is_empty())
            .map(|group| group.key().clone())
            .collect()
    }

    /// The channel a user is currently associated with.
    pub fn user_channel(&self, user_id: &str) -> Option<String> {
        self.users.get(user_id).map(|session| session.channel.clone())
    }

    /// Point-in-time copy of the connections in `channel`.
    pub fn snapshot(&self, channel: &str) -> Vec<Arc<Connection>> {
        let ids: Vec<ConnectionId> = match self.channels.get(channel) {
            Some(group) => group.iter().cloned().collect(),
            None => return Vec::new(),
        };
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Point-in-time copy of every live connection.
    pub fn snapshot_all(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_support::RecordingSink;

    fn register(registry: &ConnectionRegistry, channel: &str, user: Option<&str>) -> ConnectionId {
        registry.register(RecordingSink::new(), channel, user.map(str::to_string))
    }

    #[test]
    fn register_creates_channel_group() {
        let registry = ConnectionRegistry::new();
        assert!(registry.channels().is_empty());

        let id = register(&registry, "vault-A", None);
        assert_eq!(registry.count(Some("vault-A")), 1);
        assert_eq!(registry.count(None), 1);
        assert!(registry.channels().contains("vault-A"));

        let conn = registry.get(&id).unwrap();
        assert_eq!(conn.channel(), "vault-A");
        assert!(conn.user_id().is_none());
    }

    #[test]
    fn count_spans_channels() {
        let registry = ConnectionRegistry::new();
        register(&registry, "vault-A", None);
        register(&registry, "vault-A", None);
        register(&registry, "vault-B", None);

        assert_eq!(registry.count(Some("vault-A")), 2);
        assert_eq!(registry.count(Some("vault-B")), 1);
        assert_eq!(registry.count(Some("missing")), 0);
        assert_eq!(registry.count(None), 3);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let a = register(&registry, "vault-A", None);
        register(&registry, "vault-A", None);

        assert!(registry.unregister(&a).is_some());
        assert_eq!(registry.count(Some("vault-A")), 1);

        assert!(registry.unregister(&a).is_none());
        assert_eq!(registry.count(Some("vault-A")), 1);
    }

    #[test]
    fn empty_channel_group_is_removed() {
        let registry = ConnectionRegistry::new();
        let a = register(&registry, "vault-A", None);
        let b = register(&registry, "vault-B", None);

        registry.unregister(&a);
        let channels = registry.channels();
        assert!(!channels.contains("vault-A"));
        assert!(channels.contains("vault-B"));
        assert!(registry.channels.get("vault-A").is_none());

        registry.unregister(&b);
        assert!(registry.channels().is_empty());
        assert_eq!(registry.count(None), 0);
    }

    #[test]
    fn unregister_marks_connection_closed() {
        let registry = ConnectionRegistry::new();
        let id = register(&registry, "vault-A", None);
        let conn = registry.get(&id).unwrap();
        let closed = conn.closed();

        registry.unregister(&id);
        assert!(closed.is_cancelled());
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn user_mapping_is_last_write_wins() {
        let registry = ConnectionRegistry::new();
        register(&registry, "vault-A", Some("alice"));
        assert_eq!(registry.user_channel("alice").as_deref(), Some("vault-A"));

        register(&registry, "vault-B", Some("alice"));
        assert_eq!(registry.user_channel("alice").as_deref(), Some("vault-B"));
    }

    #[test]
    fn superseded_connection_does_not_clear_newer_mapping() {
        let registry = ConnectionRegistry::new();
        let old = register(&registry, "vault-A", Some("alice"));
        let new = register(&registry, "vault-B", Some("alice"));

        registry.unregister(&old);
        assert_eq!(registry.user_channel("alice").as_deref(), Some("vault-B"));

        registry.unregister(&new);
        assert!(registry.user_channel("alice").is_none());
    }

    #[test]
    fn touch_unknown_connection_returns_false() {
        let registry = ConnectionRegistry::new();
        let id = register(&registry, "vault-A", None);
        assert!(registry.touch(&id));

        registry.unregister(&id);
        assert!(!registry.touch(&id));
    }

    #[test]
    fn snapshot_is_unaffected_by_later_unregister() {
        let registry = ConnectionRegistry::new();
        let a = register(&registry, "vault-A", None);
        let b = register(&registry, "vault-A", None);

        let snapshot = registry.snapshot("vault-A");
        registry.unregister(&a);
        registry.unregister(&b);

        assert_eq!(snapshot.len(), 2);
        assert!(registry.snapshot("vault-A").is_empty());
    }

    #[test]
    fn snapshot_all_covers_every_channel() {
        let registry = ConnectionRegistry::new();
        register(&registry, "vault-A", None);
        register(&registry, "vault-B", None);
        register(&registry, DEFAULT_CHANNEL, None);
        assert_eq!(registry.snapshot_all().len(), 3);
    }

    #[test]
    fn random_register_unregister_sequence_keeps_counts() {
        let registry = ConnectionRegistry::new();
        let channels = ["a", "b", "c"];
        let mut live: Vec<(ConnectionId, &str)> = Vec::new();

        for step in 0..60usize {
            let channel = channels[step % channels.len()];
            if step % 4 == 3 && !live.is_empty() {
                let (id, _) = live.remove(step % live.len());
                registry.unregister(&id);
                // Second unregister must not change anything.
                registry.unregister(&id);
            } else {
                live.push((register(&registry, channel, None), channel));
            }

            for channel in channels {
                let expected = live.iter().filter(|(_, c)| *c == channel).count();
                assert_eq!(registry.count(Some(channel)), expected);
                assert_eq!(registry.channels().contains(channel), expected > 0);
            }
            assert_eq!(registry.count(None), live.len());
        }
    }
}
