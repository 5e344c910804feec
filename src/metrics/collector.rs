//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the stranger-room service
//! using Prometheus metrics.

use crate::matchmaker::MatchmakerStats;
use crate::types::LeaveReason;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Connection and queue metrics
    connection_metrics: ConnectionMetrics,

    /// Session lifecycle metrics
    session_metrics: SessionMetrics,

    /// Relay and protocol metrics
    relay_metrics: RelayMetrics,

    /// Moderation metrics
    moderation_metrics: ModerationMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Connection and waiting queue metrics
#[derive(Clone)]
pub struct ConnectionMetrics {
    /// Connections currently open
    pub connections_online: IntGauge,

    /// Total connections opened
    pub connections_total: IntCounter,

    /// Total connections closed
    pub disconnections_total: IntCounter,

    /// Connections currently waiting for a partner
    pub connections_waiting: IntGauge,

    /// Total enqueue operations
    pub enqueued_total: IntCounter,

    /// Time spent waiting before a match
    pub queue_wait_time_seconds: Histogram,

    /// Find requests refused by policy
    pub refusals_total: IntCounterVec,
}

/// Session lifecycle metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Sessions currently active
    pub active_sessions: IntGauge,

    /// Total sessions created
    pub sessions_created_total: IntCounter,

    /// Total sessions ended, by reason
    pub sessions_ended_total: IntCounterVec,

    /// Session lifetime
    pub session_duration_seconds: HistogramVec,
}

/// Relay and protocol metrics
#[derive(Clone)]
pub struct RelayMetrics {
    /// Inbound events handled, by event name
    pub events_handled_total: IntCounterVec,

    /// Inbound events dropped, by reason
    pub events_dropped_total: IntCounterVec,

    /// Messages relayed, by kind
    pub messages_relayed_total: IntCounterVec,

    /// Typing signals relayed
    pub typing_relayed_total: IntCounter,

    /// Outbound sends that failed
    pub send_failures_total: IntCounter,
}

/// Moderation metrics
#[derive(Clone)]
pub struct ModerationMetrics {
    /// Reports filed
    pub reports_total: IntCounter,

    /// Blocks applied
    pub blocks_total: IntCounter,

    /// Cooldowns applied after repeated reports
    pub cooldowns_applied_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Inbound event processing time
    pub event_processing_duration: HistogramVec,

    /// Match pass duration
    pub match_pass_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let service_metrics = ServiceMetrics::new(&registry)?;
        let connection_metrics = ConnectionMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let relay_metrics = RelayMetrics::new(&registry)?;
        let moderation_metrics = ModerationMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            connection_metrics,
            session_metrics,
            relay_metrics,
            moderation_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn connection(&self) -> &ConnectionMetrics {
        &self.connection_metrics
    }

    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    pub fn relay(&self) -> &RelayMetrics {
        &self.relay_metrics
    }

    pub fn moderation(&self) -> &ModerationMetrics {
        &self.moderation_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh gauges from matchmaker stats
    pub fn update_from_stats(&self, stats: &MatchmakerStats) {
        self.connection_metrics
            .connections_online
            .set(stats.online as i64);
        self.connection_metrics
            .connections_waiting
            .set(stats.waiting as i64);
        self.session_metrics
            .active_sessions
            .set(stats.active_sessions as i64);
    }

    /// Record a connection opening
    pub fn record_connect(&self, online: usize) {
        self.connection_metrics.connections_total.inc();
        self.connection_metrics.connections_online.set(online as i64);
    }

    /// Record a connection closing
    pub fn record_disconnect(&self, online: usize) {
        self.connection_metrics.disconnections_total.inc();
        self.connection_metrics.connections_online.set(online as i64);
    }

    /// Record a connection entering the waiting queue
    pub fn record_enqueued(&self, waiting: usize) {
        self.connection_metrics.enqueued_total.inc();
        self.connection_metrics.connections_waiting.set(waiting as i64);
    }

    /// Record a find request refused by policy
    pub fn record_refusal(&self, reason: &str) {
        self.connection_metrics
            .refusals_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a new session and how long each side waited
    pub fn record_session_created(&self, wait_times: &[Duration]) {
        self.session_metrics.sessions_created_total.inc();
        self.session_metrics.active_sessions.inc();
        for wait in wait_times {
            self.connection_metrics
                .queue_wait_time_seconds
                .observe(wait.as_secs_f64());
        }
    }

    /// Record a session ending
    pub fn record_session_ended(&self, reason: LeaveReason, lifetime: Duration) {
        self.session_metrics
            .sessions_ended_total
            .with_label_values(&[reason.as_str()])
            .inc();
        self.session_metrics.active_sessions.dec();
        self.session_metrics
            .session_duration_seconds
            .with_label_values(&[reason.as_str()])
            .observe(lifetime.as_secs_f64());
    }

    /// Record an inbound event and its processing time
    pub fn record_event(&self, event: &str, duration: Duration) {
        self.relay_metrics
            .events_handled_total
            .with_label_values(&[event])
            .inc();
        self.performance_metrics
            .event_processing_duration
            .with_label_values(&[event])
            .observe(duration.as_secs_f64());
    }

    /// Record an inbound event that was dropped
    pub fn record_dropped(&self, reason: &str) {
        self.relay_metrics
            .events_dropped_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a relayed message
    pub fn record_message_relayed(&self, kind: &str) {
        self.relay_metrics
            .messages_relayed_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a relayed typing signal
    pub fn record_typing_relayed(&self) {
        self.relay_metrics.typing_relayed_total.inc();
    }

    /// Record a failed outbound send
    pub fn record_send_failure(&self) {
        self.relay_metrics.send_failures_total.inc();
    }

    /// Record a report and whether it triggered a cooldown
    pub fn record_report(&self, cooldown_applied: bool) {
        self.moderation_metrics.reports_total.inc();
        if cooldown_applied {
            self.moderation_metrics.cooldowns_applied_total.inc();
        }
    }

    /// Record a block
    pub fn record_block(&self) {
        self.moderation_metrics.blocks_total.inc();
    }

    /// Record a match pass duration
    pub fn record_match_pass(&self, duration: Duration) {
        self.performance_metrics
            .match_pass_duration
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("stranger_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "stranger_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("stranger_room_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl ConnectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let connections_online = IntGauge::new(
            "stranger_room_connections_online",
            "Connections currently open",
        )?;
        registry.register(Box::new(connections_online.clone()))?;

        let connections_total = IntCounter::new(
            "stranger_room_connections_total",
            "Total connections opened",
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let disconnections_total = IntCounter::new(
            "stranger_room_disconnections_total",
            "Total connections closed",
        )?;
        registry.register(Box::new(disconnections_total.clone()))?;

        let connections_waiting = IntGauge::new(
            "stranger_room_connections_waiting",
            "Connections waiting for a partner",
        )?;
        registry.register(Box::new(connections_waiting.clone()))?;

        let enqueued_total = IntCounter::new(
            "stranger_room_enqueued_total",
            "Total waiting queue insertions",
        )?;
        registry.register(Box::new(enqueued_total.clone()))?;

        let queue_wait_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "stranger_room_queue_wait_time_seconds",
                "Time spent waiting before a match",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0]),
        )?;
        registry.register(Box::new(queue_wait_time_seconds.clone()))?;

        let refusals_total = IntCounterVec::new(
            Opts::new(
                "stranger_room_refusals_total",
                "Requests refused by matchmaking policy",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(refusals_total.clone()))?;

        Ok(Self {
            connections_online,
            connections_total,
            disconnections_total,
            connections_waiting,
            enqueued_total,
            queue_wait_time_seconds,
            refusals_total,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_sessions =
            IntGauge::new("stranger_room_active_sessions", "Sessions currently active")?;
        registry.register(Box::new(active_sessions.clone()))?;

        let sessions_created_total = IntCounter::new(
            "stranger_room_sessions_created_total",
            "Total sessions created",
        )?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        let sessions_ended_total = IntCounterVec::new(
            Opts::new("stranger_room_sessions_ended_total", "Total sessions ended"),
            &["reason"],
        )?;
        registry.register(Box::new(sessions_ended_total.clone()))?;

        let session_duration_seconds = HistogramVec::new(
            HistogramOpts::new("stranger_room_session_duration_seconds", "Session lifetime")
                .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
            &["reason"],
        )?;
        registry.register(Box::new(session_duration_seconds.clone()))?;

        Ok(Self {
            active_sessions,
            sessions_created_total,
            sessions_ended_total,
            session_duration_seconds,
        })
    }
}

impl RelayMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let events_handled_total = IntCounterVec::new(
            Opts::new(
                "stranger_room_events_handled_total",
                "Inbound events handled",
            ),
            &["event"],
        )?;
        registry.register(Box::new(events_handled_total.clone()))?;

        let events_dropped_total = IntCounterVec::new(
            Opts::new(
                "stranger_room_events_dropped_total",
                "Inbound events dropped",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(events_dropped_total.clone()))?;

        let messages_relayed_total = IntCounterVec::new(
            Opts::new(
                "stranger_room_messages_relayed_total",
                "Chat messages relayed",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(messages_relayed_total.clone()))?;

        let typing_relayed_total = IntCounter::new(
            "stranger_room_typing_relayed_total",
            "Typing signals relayed",
        )?;
        registry.register(Box::new(typing_relayed_total.clone()))?;

        let send_failures_total = IntCounter::new(
            "stranger_room_send_failures_total",
            "Outbound sends that failed",
        )?;
        registry.register(Box::new(send_failures_total.clone()))?;

        Ok(Self {
            events_handled_total,
            events_dropped_total,
            messages_relayed_total,
            typing_relayed_total,
            send_failures_total,
        })
    }
}

impl ModerationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let reports_total = IntCounter::new("stranger_room_reports_total", "Reports filed")?;
        registry.register(Box::new(reports_total.clone()))?;

        let blocks_total = IntCounter::new("stranger_room_blocks_total", "Blocks applied")?;
        registry.register(Box::new(blocks_total.clone()))?;

        let cooldowns_applied_total = IntCounter::new(
            "stranger_room_cooldowns_applied_total",
            "Cooldowns applied after repeated reports",
        )?;
        registry.register(Box::new(cooldowns_applied_total.clone()))?;

        Ok(Self {
            reports_total,
            blocks_total,
            cooldowns_applied_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let event_processing_duration = HistogramVec::new(
            HistogramOpts::new(
                "stranger_room_event_processing_duration_seconds",
                "Inbound event processing time",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1]),
            &["event"],
        )?;
        registry.register(Box::new(event_processing_duration.clone()))?;

        let match_pass_duration = Histogram::with_opts(
            HistogramOpts::new(
                "stranger_room_match_pass_duration_seconds",
                "Match pass duration",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1]),
        )?;
        registry.register(Box::new(match_pass_duration.clone()))?;

        Ok(Self {
            event_processing_duration,
            match_pass_duration,
        })
    }
}
