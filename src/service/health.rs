//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the stranger-room
//! service, including readiness and liveness probes.

use crate::matchmaker::MatchmakerStats;
use crate::service::app::CoreHandle;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

impl HealthStatus {
    /// Gauge value exported to Prometheus
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }
}

/// Overall health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall health status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Timestamp of the check
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Individual component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub online: usize,
    pub waiting: usize,
    pub active_sessions: usize,
    pub sessions_created: u64,
    pub sessions_ended: u64,
    pub reports_filed: u64,
    pub messages_relayed: u64,
    pub uptime_seconds: u64,
}

/// Everything a health check needs to look at, cheap to clone
#[derive(Clone)]
pub struct HealthProbe {
    pub service_name: String,
    pub stats: Arc<StdRwLock<MatchmakerStats>>,
    pub is_running: Arc<RwLock<bool>>,
    pub core: CoreHandle,
    pub started_at: Instant,
}

impl HealthProbe {
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(probe: &HealthProbe) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(probe).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        for check in [Self::check_event_loop(probe), Self::check_stats(probe)] {
            if check.status == HealthStatus::Unhealthy {
                overall_status = HealthStatus::Unhealthy;
            } else if check.status == HealthStatus::Degraded
                && overall_status == HealthStatus::Healthy
            {
                overall_status = HealthStatus::Degraded;
            }
            checks.push(check);
        }

        let stats = Self::gather_service_stats(probe);

        Ok(HealthCheck {
            status: overall_status,
            service: probe.service_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(probe: &HealthProbe) -> Result<HealthStatus> {
        if probe.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can accept connections
    pub async fn readiness_check(probe: &HealthProbe) -> Result<HealthStatus> {
        if !probe.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_event_loop(probe).status)
    }

    async fn check_service_running(probe: &HealthProbe) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if probe.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The core task must still be draining its channel
    fn check_event_loop(probe: &HealthProbe) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if probe.core.is_alive() {
            (HealthStatus::Healthy, None)
        } else {
            error!("Core event loop is not running");
            (
                HealthStatus::Unhealthy,
                Some("Core event loop has stopped".to_string()),
            )
        };

        ComponentCheck {
            name: "event_loop".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_stats(probe: &HealthProbe) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match probe.stats.read() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (
                HealthStatus::Degraded,
                Some(format!("Stats unavailable: {}", e)),
            ),
        };

        ComponentCheck {
            name: "matchmaker_stats".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(probe: &HealthProbe) -> ServiceStats {
        let uptime_seconds = probe.started_at.elapsed().as_secs();

        match probe.stats.read() {
            Ok(stats) => ServiceStats {
                online: stats.online,
                waiting: stats.waiting,
                active_sessions: stats.active_sessions,
                sessions_created: stats.sessions_created,
                sessions_ended: stats.sessions_ended,
                reports_filed: stats.reports_filed,
                messages_relayed: stats.messages_relayed,
                uptime_seconds,
            },
            Err(e) => {
                debug!("Failed to read matchmaker stats for health check: {}", e);
                ServiceStats {
                    uptime_seconds,
                    ..Default::default()
                }
            }
        }
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(
        running: bool,
    ) -> (
        HealthProbe,
        tokio::sync::mpsc::UnboundedReceiver<crate::types::TransportEvent>,
    ) {
        let (core, rx) = CoreHandle::channel();
        let probe = HealthProbe {
            service_name: "stranger-room-test".to_string(),
            stats: Arc::new(StdRwLock::new(MatchmakerStats {
                online: 4,
                waiting: 2,
                active_sessions: 1,
                ..Default::default()
            })),
            is_running: Arc::new(RwLock::new(running)),
            core,
            started_at: Instant::now(),
        };
        (probe, rx)
    }

    #[tokio::test]
    async fn test_healthy_when_running() {
        let (probe, _rx) = probe(true);
        let health = HealthCheck::check(&probe).await.unwrap();

        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.checks.len(), 3);
        assert_eq!(health.stats.online, 4);
        assert_eq!(health.stats.waiting, 2);
        assert!(health.to_json().unwrap().contains("stranger-room-test"));
    }

    #[tokio::test]
    async fn test_unhealthy_when_not_running() {
        let (probe, _rx) = probe(false);
        assert_eq!(
            HealthCheck::liveness_check(&probe).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::check(&probe).await.unwrap().status,
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_not_ready_when_event_loop_stopped() {
        let (probe, rx) = probe(true);
        drop(rx);
        assert_eq!(
            HealthCheck::readiness_check(&probe).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::liveness_check(&probe).await.unwrap(),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn test_status_gauge_values() {
        assert_eq!(HealthStatus::Healthy.as_gauge(), 2);
        assert_eq!(HealthStatus::Degraded.as_gauge(), 1);
        assert_eq!(HealthStatus::Unhealthy.as_gauge(), 0);
        assert_eq!(HealthStatus::Degraded.to_string(), "degraded");
    }
}
