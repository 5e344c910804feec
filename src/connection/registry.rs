//! Registry of live transport connections

use crate::types::ConnectionId;
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct ConnectionEntry {
    connected_at: DateTime<Utc>,
    reachable: bool,
}

/// Tracks open connections and whether each one can still be sent to.
///
/// All operations are idempotent; unknown ids are ignored.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns true if the online count changed.
    pub fn register(&mut self, connection_id: &str) -> bool {
        if self.connections.contains_key(connection_id) {
            return false;
        }

        self.connections.insert(
            connection_id.to_string(),
            ConnectionEntry {
                connected_at: current_timestamp(),
                reachable: true,
            },
        );
        true
    }

    /// Remove a connection. Returns true if the online count changed.
    pub fn unregister(&mut self, connection_id: &str) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    /// Whether the connection is registered and still reachable
    pub fn is_live(&self, connection_id: &str) -> bool {
        self.connections
            .get(connection_id)
            .map(|entry| entry.reachable)
            .unwrap_or(false)
    }

    /// Whether the connection is registered at all
    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Record a failed send. The entry stays until the transport reports the
    /// disconnect, but it is no longer eligible for matching.
    pub fn mark_unreachable(&mut self, connection_id: &str) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(entry) if entry.reachable => {
                debug!("Connection {} marked unreachable", connection_id);
                entry.reachable = false;
                true
            }
            _ => false,
        }
    }

    /// Number of registered connections
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Ids of all reachable connections
    pub fn live_ids(&self) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, entry)| entry.reachable)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// When the connection was registered
    pub fn connected_at(&self, connection_id: &str) -> Option<DateTime<Utc>> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.connected_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register("a"));
        assert!(!registry.register("a"));
        assert_eq!(registry.count(), 1);
        assert!(registry.is_live("a"));
        assert!(registry.connected_at("a").is_some());

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert_eq!(registry.count(), 0);
        assert!(!registry.is_live("a"));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut registry = ConnectionRegistry::new();
        assert!(!registry.is_live("ghost"));
        assert!(!registry.mark_unreachable("ghost"));
        assert!(!registry.unregister("ghost"));
    }

    #[test]
    fn test_unreachable_connection_is_not_live() {
        let mut registry = ConnectionRegistry::new();
        registry.register("a");
        registry.register("b");

        assert!(registry.mark_unreachable("a"));
        assert!(!registry.mark_unreachable("a"));

        assert!(!registry.is_live("a"));
        assert!(registry.contains("a"));
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.live_ids(), vec!["b".to_string()]);
    }
}
