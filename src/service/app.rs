//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the matchmaking
//! core to the WebSocket transport and the health server, and owns the
//! background tasks.

use crate::config::AppConfig;
use crate::error::{MatchmakingError, Result as MatchmakingResult};
use crate::matchmaker::{Matchmaker, MatchmakerStats};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::router::EventRouter;
use crate::service::health::{HealthCheck, HealthProbe, HealthStatus};
use crate::transport::{
    ChannelEventSink, EventHandler, EventSink, WebSocketServer, WebSocketServerConfig,
    WebSocketState,
};
use crate::types::{ClientEvent, ServerEvent, TransportEvent};
use async_trait::async_trait;
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Notice broadcast to every live connection before the listeners close
pub const MSG_SHUTTING_DOWN: &str = "Server is restarting. Please reconnect in a moment.";

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Stats unavailable: {message}")]
    Stats { message: String },
}

/// Sending half of the core event loop
///
/// Every socket task holds a clone; the loop itself is the only owner of
/// the matchmaker, so all state transitions happen in arrival order.
#[derive(Clone)]
pub struct CoreHandle {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl CoreHandle {
    /// Create a handle together with the receiver the loop will drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a notification for the core loop
    pub fn submit(&self, event: TransportEvent) -> MatchmakingResult<()> {
        self.tx.send(event).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!(
                    "Core event loop is gone, dropping event for {}",
                    e.0.connection_id()
                ),
            }
            .into()
        })
    }

    /// False once the loop has stopped receiving
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[async_trait]
impl EventHandler for CoreHandle {
    async fn handle_connect(&self, connection_id: &str) -> MatchmakingResult<()> {
        self.submit(TransportEvent::Connected(connection_id.to_string()))
    }

    async fn handle_event(&self, connection_id: &str, event: ClientEvent) -> MatchmakingResult<()> {
        self.submit(TransportEvent::Event {
            connection_id: connection_id.to_string(),
            event,
        })
    }

    async fn handle_disconnect(&self, connection_id: &str) -> MatchmakingResult<()> {
        self.submit(TransportEvent::Disconnected(connection_id.to_string()))
    }
}

/// Spawn the core event loop around `router`
///
/// Per-event failures are logged and the loop keeps going. The loop ends
/// when every [`CoreHandle`] has been dropped.
pub fn spawn_core(router: EventRouter) -> (CoreHandle, JoinHandle<()>) {
    let (handle, mut rx) = CoreHandle::channel();

    let task = tokio::spawn(async move {
        let mut router = router;
        info!("Core event loop started");

        while let Some(event) = rx.recv().await {
            let connection_id = event.connection_id().to_string();
            if let Err(e) = router.handle(event) {
                warn!("Failed to handle event from {}: {}", connection_id, e);
            }
        }

        info!("Core event loop stopped");
    });

    (handle, task)
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Handle into the core event loop
    core: CoreHandle,

    /// Core event loop task
    core_task: Option<JoinHandle<()>>,

    /// Outbound per-connection channels
    sink: Arc<ChannelEventSink>,

    /// Matchmaker counters, shared with health checks
    stats: Arc<StdRwLock<MatchmakerStats>>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// WebSocket listener
    websocket_server: Arc<WebSocketServer>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing stranger-room service");
        info!(
            "Configuration: service={}, http_port={}, health_port={}, match_policy={}",
            config.service.name,
            config.service.http_port,
            config.service.health_port,
            config.matchmaking.match_policy
        );

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let sink = Arc::new(ChannelEventSink::new());
        let matchmaker = Matchmaker::with_metrics(
            config.matchmaking.clone(),
            sink.clone(),
            metrics_collector.clone(),
        );
        let stats = matchmaker.stats_handle();
        info!("Matchmaker initialized with {} policy", matchmaker.policy_name());

        let router = EventRouter::new(matchmaker, config.relay.clone(), metrics_collector.clone());
        let (core, core_task) = spawn_core(router);

        let is_running = Arc::new(RwLock::new(false));
        let started_at = Instant::now();

        let probe = HealthProbe {
            service_name: config.service.name.clone(),
            stats: stats.clone(),
            is_running: is_running.clone(),
            core: core.clone(),
            started_at,
        };

        let health_server = HealthServer::new(
            HealthServerConfig {
                port: config.service.health_port,
                host: config.service.host.clone(),
            },
            metrics_collector.clone(),
        )
        .with_probe(probe);
        let metrics_service = Arc::new(MetricsService::new(
            metrics_collector.clone(),
            Arc::new(health_server),
        ));

        let websocket_server = Arc::new(WebSocketServer::new(
            WebSocketServerConfig {
                host: config.service.host.clone(),
                port: config.service.http_port,
            },
            WebSocketState {
                handler: Arc::new(core.clone()),
                sink: sink.clone(),
                metrics: metrics_collector,
            },
        ));

        Ok(Self {
            config,
            core,
            core_task: Some(core_task),
            sink,
            stats,
            metrics_service,
            websocket_server,
            background_tasks: Vec::new(),
            is_running,
            started_at,
        })
    }

    /// Start the listeners and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting stranger-room service");

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;
        self.start_transport().await?;
        self.start_background_tasks().await?;

        info!("✅ Stranger-room service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of stranger-room service");

        *self.is_running.write().await = false;

        let notified = self.sink.broadcast(ServerEvent::system(MSG_SHUTTING_DOWN));
        info!("Shutdown notice sent to {} connections", notified);

        if let Err(e) = self.websocket_server.stop().await {
            warn!("Failed to stop WebSocket server: {}", e);
        } else {
            info!("✅ WebSocket server stopped");
        }

        self.stop_background_tasks().await;

        info!("Stopping metrics service...");
        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        if let Some(task) = self.core_task.take() {
            task.abort();
        }

        let final_stats = self.get_stats()?;
        info!("Final service statistics: {:?}", final_stats);
        info!(
            "✅ Stranger-room service shutdown completed after {}s",
            self.started_at.elapsed().as_secs()
        );

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Handle into the core event loop
    pub fn core_handle(&self) -> CoreHandle {
        self.core.clone()
    }

    /// Get metrics service
    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Probe for health checks outside the HTTP server
    pub fn health_probe(&self) -> HealthProbe {
        HealthProbe {
            service_name: self.config.service.name.clone(),
            stats: self.stats.clone(),
            is_running: self.is_running.clone(),
            core: self.core.clone(),
            started_at: self.started_at,
        }
    }

    /// Snapshot of the matchmaker counters
    pub fn get_stats(&self) -> Result<MatchmakerStats, ServiceError> {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .map_err(|e| ServiceError::Stats {
                message: format!("Failed to read matchmaker stats: {}", e),
            })
    }

    /// Start metrics service
    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        info!("Starting metrics and health endpoints");

        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.health_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });
        self.background_tasks.push(metrics_handle);

        // Give the server a moment to start up
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    /// Start accepting chat clients
    async fn start_transport(&mut self) -> Result<(), ServiceError> {
        if !self.core.is_alive() {
            return Err(ServiceError::Initialization {
                message: "Core event loop is not running".to_string(),
            });
        }

        let websocket_server = self.websocket_server.clone();
        let port = self.config.service.http_port;

        let transport_handle = tokio::spawn(async move {
            if let Err(e) = websocket_server.start().await {
                error!("WebSocket server failed: {}", e);
            }
        });
        self.background_tasks.push(transport_handle);

        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ WebSocket endpoint started on port {}", port);
        Ok(())
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&mut self) -> Result<(), ServiceError> {
        info!("Starting background maintenance tasks...");

        info!("Starting matchmaker metrics update task (30s interval)...");
        let metrics_task = {
            let stats = self.stats.clone();
            let metrics_collector = self.metrics_service.collector();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(30));
                info!("Metrics update task started");

                while *is_running.read().await {
                    interval.tick().await;

                    let snapshot = match stats.read() {
                        Ok(stats) => stats.clone(),
                        Err(e) => {
                            warn!("Failed to read matchmaker stats for metrics update: {}", e);
                            continue;
                        }
                    };
                    debug!(
                        "Updating metrics - online: {}, waiting: {}, sessions: {}",
                        snapshot.online, snapshot.waiting, snapshot.active_sessions
                    );
                    metrics_collector.update_from_stats(&snapshot);
                }

                info!("Metrics update task stopped");
            })
        };

        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let metrics_collector = self.metrics_service.collector();
            let probe = self.health_probe();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                while probe.is_running().await {
                    interval.tick().await;

                    let uptime_seconds = probe.started_at.elapsed().as_secs() as i64;
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(uptime_seconds);

                    match HealthCheck::check(&probe).await {
                        Ok(health) => {
                            metrics_collector.update_health_status(health.status.as_gauge());
                            for check in &health.checks {
                                metrics_collector.update_component_health(
                                    &check.name,
                                    check.status != HealthStatus::Unhealthy,
                                );
                            }
                            debug!(
                                "Updated service health metrics - status: {}, uptime: {}s",
                                health.status, uptime_seconds
                            );
                        }
                        Err(e) => warn!("Health check failed: {}", e),
                    }
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(metrics_task);
        self.background_tasks.push(health_metrics_task);

        info!("2 background maintenance tasks started successfully");
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        // Give tasks time to clean up gracefully
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("✅ All {} background tasks stopped", task_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchmakingSettings;
    use crate::transport::MockEventSink;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.service.host = "127.0.0.1".to_string();
        config
    }

    #[tokio::test]
    async fn test_core_loop_processes_events_in_order() {
        let sink = Arc::new(MockEventSink::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let matchmaker =
            Matchmaker::with_metrics(MatchmakingSettings::default(), sink.clone(), metrics.clone());
        let stats = matchmaker.stats_handle();
        let router = EventRouter::new(matchmaker, Default::default(), metrics);

        let (core, task) = spawn_core(router);
        core.handle_connect("a").await.unwrap();
        core.handle_connect("b").await.unwrap();
        core.handle_event("a", ClientEvent::Find).await.unwrap();
        core.handle_event("b", ClientEvent::Find).await.unwrap();

        drop(core);
        task.await.unwrap();

        assert_eq!(stats.read().unwrap().active_sessions, 1);
        assert_eq!(sink.count_for("a", "matched"), 1);
        assert_eq!(sink.count_for("b", "matched"), 1);
    }

    #[tokio::test]
    async fn test_submit_fails_after_loop_stops() {
        let (core, rx) = CoreHandle::channel();
        assert!(core.is_alive());
        drop(rx);

        assert!(!core.is_alive());
        assert!(core.handle_connect("a").await.is_err());
    }

    #[tokio::test]
    async fn test_app_state_rejects_invalid_config() {
        let mut config = test_config();
        config.service.http_port = config.service.health_port;

        let result = AppState::new(config).await;
        assert!(matches!(result, Err(ServiceError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_app_state_probe_before_start() {
        let state = AppState::new(test_config()).await.unwrap();
        assert!(!state.is_running().await);

        let probe = state.health_probe();
        assert!(probe.core.is_alive());
        assert_eq!(state.get_stats().unwrap(), MatchmakerStats::default());
    }
}
