//! Outbound event delivery
//!
//! The core never touches sockets. It hands events to an [`EventSink`], which
//! routes them to the writer task of each connection.

use crate::types::{ConnectionId, ServerEvent};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Trait for delivering outbound events to connections
pub trait EventSink: Send + Sync {
    /// Queue an event for one connection. Returns false if it cannot be delivered.
    fn send(&self, connection_id: &str, event: ServerEvent) -> bool;

    /// Queue an event for every attached connection. Returns the number reached.
    fn broadcast(&self, event: ServerEvent) -> usize;
}

/// Sink backed by one unbounded channel per connection
#[derive(Debug, Default)]
pub struct ChannelEventSink {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>>,
}

impl ChannelEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection and return the receiver its writer task drains
    pub fn attach(&self, connection_id: &str) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.senders.write() {
            Ok(mut senders) => {
                senders.insert(connection_id.to_string(), tx);
            }
            Err(e) => warn!("Failed to attach connection {}: {}", connection_id, e),
        }
        rx
    }

    /// Detach a connection; its receiver sees the channel close
    pub fn detach(&self, connection_id: &str) -> bool {
        self.senders
            .write()
            .map(|mut senders| senders.remove(connection_id).is_some())
            .unwrap_or(false)
    }

    pub fn attached_count(&self) -> usize {
        self.senders.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, connection_id: &str, event: ServerEvent) -> bool {
        let senders = match self.senders.read() {
            Ok(senders) => senders,
            Err(e) => {
                warn!("Event sink lock poisoned: {}", e);
                return false;
            }
        };

        match senders.get(connection_id) {
            Some(tx) => match tx.send(event) {
                Ok(()) => true,
                Err(e) => {
                    debug!(
                        "Writer for {} is gone, dropping {} event",
                        connection_id,
                        e.0.name()
                    );
                    false
                }
            },
            None => {
                debug!(
                    "No writer attached for {}, dropping {} event",
                    connection_id,
                    event.name()
                );
                false
            }
        }
    }

    fn broadcast(&self, event: ServerEvent) -> usize {
        let senders = match self.senders.read() {
            Ok(senders) => senders,
            Err(e) => {
                warn!("Event sink lock poisoned: {}", e);
                return 0;
            }
        };

        senders
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }
}

/// Mock event sink for testing
#[derive(Debug, Default)]
pub struct MockEventSink {
    sent: Mutex<Vec<(ConnectionId, ServerEvent)>>,
    unreachable: Mutex<Vec<ConnectionId>>,
}

impl MockEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events sent so far, in order
    pub fn sent_events(&self) -> Vec<(ConnectionId, ServerEvent)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Events received by one connection
    pub fn events_for(&self, connection_id: &str) -> Vec<ServerEvent> {
        self.sent_events()
            .into_iter()
            .filter(|(id, _)| id == connection_id)
            .map(|(_, event)| event)
            .collect()
    }

    /// Number of events named `name` received by one connection
    pub fn count_for(&self, connection_id: &str, name: &str) -> usize {
        self.events_for(connection_id)
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }

    /// Make every later send to `connection_id` fail
    pub fn fail_for(&self, connection_id: &str) {
        if let Ok(mut unreachable) = self.unreachable.lock() {
            unreachable.push(connection_id.to_string());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl EventSink for MockEventSink {
    fn send(&self, connection_id: &str, event: ServerEvent) -> bool {
        let failing = self
            .unreachable
            .lock()
            .map(|ids| ids.iter().any(|id| id == connection_id))
            .unwrap_or(false);
        if failing {
            return false;
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((connection_id.to_string(), event));
        }
        true
    }

    fn broadcast(&self, event: ServerEvent) -> usize {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(("*".to_string(), event));
        }
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers_to_attached_connection() {
        let sink = ChannelEventSink::new();
        let mut rx = sink.attach("a");

        assert!(sink.send("a", ServerEvent::Finding));
        assert_eq!(rx.recv().await, Some(ServerEvent::Finding));
        assert!(!sink.send("b", ServerEvent::Finding));
    }

    #[tokio::test]
    async fn test_detach_closes_channel() {
        let sink = ChannelEventSink::new();
        let mut rx = sink.attach("a");
        assert!(sink.detach("a"));
        assert!(!sink.detach("a"));
        assert_eq!(rx.recv().await, None);
        assert!(!sink.send("a", ServerEvent::Finding));
    }

    #[test]
    fn test_send_fails_when_receiver_dropped() {
        let sink = ChannelEventSink::new();
        let rx = sink.attach("a");
        drop(rx);
        assert!(!sink.send("a", ServerEvent::Finding));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let sink = ChannelEventSink::new();
        let mut a = sink.attach("a");
        let mut b = sink.attach("b");
        drop(sink.attach("c"));

        let reached = sink.broadcast(ServerEvent::OnlineCount { count: 2 });
        assert_eq!(reached, 2);
        assert_eq!(a.recv().await, Some(ServerEvent::OnlineCount { count: 2 }));
        assert_eq!(b.recv().await, Some(ServerEvent::OnlineCount { count: 2 }));
        assert_eq!(sink.attached_count(), 3);
    }

    #[test]
    fn test_mock_sink_records_and_fails() {
        let sink = MockEventSink::new();
        assert!(sink.send("a", ServerEvent::Finding));
        assert!(sink.send("a", ServerEvent::system("hi")));
        assert_eq!(sink.count_for("a", "finding"), 1);
        assert_eq!(sink.events_for("a").len(), 2);

        sink.fail_for("b");
        assert!(!sink.send("b", ServerEvent::Finding));
        assert!(sink.events_for("b").is_empty());

        sink.clear();
        assert!(sink.sent_events().is_empty());
    }
}
