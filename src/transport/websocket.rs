//! WebSocket transport adapter
//!
//! Upgrades `GET /ws` requests, mints a connection id per socket and turns
//! socket activity into connect/event/disconnect notifications. Outbound
//! events arrive on the connection's sink channel and are written by a
//! dedicated writer task.

use crate::metrics::MetricsCollector;
use crate::transport::handlers::EventHandler;
use crate::transport::messages::{decode_client_event, encode_server_event};
use crate::transport::publisher::ChannelEventSink;
use crate::utils::generate_connection_id;
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// WebSocket server configuration
#[derive(Debug, Clone)]
pub struct WebSocketServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebSocketServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Shared state for socket handlers
#[derive(Clone)]
pub struct WebSocketState {
    pub handler: Arc<dyn EventHandler>,
    pub sink: Arc<ChannelEventSink>,
    pub metrics: Arc<MetricsCollector>,
}

/// Server accepting chat client connections
pub struct WebSocketServer {
    config: WebSocketServerConfig,
    state: WebSocketState,
    shutdown_tx: broadcast::Sender<()>,
}

impl WebSocketServer {
    pub fn new(config: WebSocketServerConfig, state: WebSocketState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    /// Bind and serve until [`WebSocketServer::stop`] is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid WebSocket server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr).await?;

        info!("WebSocket server listening on ws://{}/ws", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("WebSocket server shutdown signal received");
            })
            .await?;

        info!("WebSocket server stopped");
        Ok(())
    }

    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .with_state(self.state.clone())
    }

    pub async fn stop(&self) -> Result<()> {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to WebSocket server: {}", e);
        }
        Ok(())
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WebSocketState) {
    let connection_id = generate_connection_id();
    let outbound = state.sink.attach(&connection_id);

    if let Err(e) = state.handler.handle_connect(&connection_id).await {
        warn!("Failed to register connection {}: {}", connection_id, e);
        state.sink.detach(&connection_id);
        return;
    }
    debug!("WebSocket connection {} opened", connection_id);

    let (mut sender, mut receiver) = socket.split();

    let writer_id = connection_id.clone();
    let writer_metrics = state.metrics.clone();
    let mut send_task = tokio::spawn(async move {
        let mut outbound = UnboundedReceiverStream::new(outbound);
        while let Some(event) = outbound.next().await {
            let text = match encode_server_event(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Dropping outbound event for {}: {}", writer_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                writer_metrics.record_send_failure();
                break;
            }
        }
    });

    let reader_id = connection_id.clone();
    let reader_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match decode_client_event(text.as_str()) {
                    Ok(event) => {
                        if let Err(e) = reader_state.handler.handle_event(&reader_id, event).await
                        {
                            warn!("Failed to forward event from {}: {}", reader_id, e);
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("Dropping frame from {}: {}", reader_id, e);
                        reader_state.metrics.record_dropped("malformed");
                    }
                },
                Message::Binary(_) => {
                    debug!("Dropping binary frame from {}", reader_id);
                    reader_state.metrics.record_dropped("binary");
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.sink.detach(&connection_id);
    if let Err(e) = state.handler.handle_disconnect(&connection_id).await {
        warn!("Failed to report disconnect of {}: {}", connection_id, e);
    }
    debug!("WebSocket connection {} closed", connection_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::handlers::MockEventHandler;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn test_server() -> WebSocketServer {
        let state = WebSocketState {
            handler: Arc::new(MockEventHandler::new()),
            sink: Arc::new(ChannelEventSink::new()),
            metrics: Arc::new(MetricsCollector::new().unwrap()),
        };
        WebSocketServer::new(WebSocketServerConfig::default(), state)
    }

    #[tokio::test]
    async fn test_plain_get_is_not_upgraded() {
        let app = test_server().create_router();
        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // No upgrade headers, so the extractor rejects the request
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = test_server().create_router();
        let response = app
            .oneshot(Request::builder().uri("/chat").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_default_config() {
        let config = WebSocketServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
    }
}
