//! Inbound notification handling
//!
//! The WebSocket adapter reports the three things it observes (connect,
//! decoded event, disconnect) through [`EventHandler`]. The production
//! implementation forwards them to the core event loop.

use crate::error::Result;
use crate::types::{ClientEvent, TransportEvent};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait defining the interface for handling transport notifications
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// A connection was established
    async fn handle_connect(&self, connection_id: &str) -> Result<()>;

    /// A connection sent a decoded event
    async fn handle_event(&self, connection_id: &str, event: ClientEvent) -> Result<()>;

    /// A connection closed
    async fn handle_disconnect(&self, connection_id: &str) -> Result<()>;
}

/// Mock event handler for testing
pub struct MockEventHandler {
    pub received: Arc<tokio::sync::Mutex<Vec<TransportEvent>>>,
}

impl Default for MockEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEventHandler {
    pub fn new() -> Self {
        Self {
            received: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl EventHandler for MockEventHandler {
    async fn handle_connect(&self, connection_id: &str) -> Result<()> {
        let mut received = self.received.lock().await;
        received.push(TransportEvent::Connected(connection_id.to_string()));
        Ok(())
    }

    async fn handle_event(&self, connection_id: &str, event: ClientEvent) -> Result<()> {
        let mut received = self.received.lock().await;
        received.push(TransportEvent::Event {
            connection_id: connection_id.to_string(),
            event,
        });
        Ok(())
    }

    async fn handle_disconnect(&self, connection_id: &str) -> Result<()> {
        let mut received = self.received.lock().await;
        received.push(TransportEvent::Disconnected(connection_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_handler() {
        let handler = MockEventHandler::new();
        handler.handle_connect("a").await.unwrap();
        handler.handle_event("a", ClientEvent::Find).await.unwrap();
        handler.handle_disconnect("a").await.unwrap();

        let received = handler.received.lock().await;
        assert_eq!(received.len(), 3);
        assert_eq!(received[0], TransportEvent::Connected("a".to_string()));
        assert_eq!(received[1].connection_id(), "a");
        assert_eq!(received[2], TransportEvent::Disconnected("a".to_string()));
    }
}
