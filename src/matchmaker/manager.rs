//! Matchmaker implementation for pairing waiting connections
//!
//! This module provides the core Matchmaker that owns the connection
//! registry, profiles, waiting queue and session table, and drives every
//! queue to session transition. It is a plain state machine: the service
//! layer owns it inside a single task and feeds it one notification at a
//! time, so no operation here needs to lock the core state.

use crate::config::MatchmakingSettings;
use crate::connection::ConnectionRegistry;
use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::profile::ProfileStore;
use crate::queue::{policy_for, MatchCandidates, MatchPolicy, WaitingEntry, WaitingQueue};
use crate::session::{Session, SessionTable};
use crate::transport::publisher::EventSink;
use crate::types::{
    ConnectionId, LeaveReason, ParticipantState, ProfilePayload, ServerEvent, SessionId,
};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const MSG_COOLDOWN_REFUSAL: &str = "Please wait a bit before starting a new chat.";
pub const MSG_RESTRICTED: &str = "You have been temporarily restricted due to reports.";
pub const MSG_REPORT_ACK: &str = "Report submitted. Thanks for keeping the chat safe.";
pub const MSG_BLOCK_ACK: &str = "You blocked this user.";
pub const MSG_NOT_CONNECTED: &str = "You are not connected yet.";

/// Statistics about matchmaker operations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchmakerStats {
    /// Connections currently open
    pub online: usize,
    /// Connections currently waiting for a partner
    pub waiting: usize,
    /// Sessions currently active
    pub active_sessions: usize,
    pub sessions_created: u64,
    pub sessions_ended: u64,
    pub reports_filed: u64,
    pub cooldowns_applied: u64,
    pub blocks: u64,
    pub messages_relayed: u64,
    /// Inbound events dropped as protocol violations
    pub events_dropped: u64,
}

/// Eligibility and compatibility as seen at one instant
struct CandidateView<'a> {
    registry: &'a ConnectionRegistry,
    profiles: &'a ProfileStore,
    now: DateTime<Utc>,
}

impl MatchCandidates for CandidateView<'_> {
    fn is_eligible(&self, connection_id: &str) -> bool {
        self.registry.is_live(connection_id)
            && !self.profiles.is_in_cooldown_at(connection_id, self.now)
    }

    fn are_compatible(&self, a: &str, b: &str) -> bool {
        a != b
            && !self.profiles.is_blocked_either_way(a, b)
            && !self.profiles.is_recent_peer(a, b)
    }

    fn interests(&self, connection_id: &str) -> &[String] {
        self.profiles.interests_of(connection_id)
    }
}

/// The matchmaker
pub struct Matchmaker {
    /// Live connections
    registry: ConnectionRegistry,
    /// Per-connection profiles and moderation state
    profiles: ProfileStore,
    /// Connections seeking a partner
    queue: WaitingQueue,
    /// Active pairings
    sessions: SessionTable,
    /// Scoring policy for the best-match search
    policy: Arc<dyn MatchPolicy>,
    settings: MatchmakingSettings,
    /// Outbound event delivery
    sink: Arc<dyn EventSink>,
    /// Published statistics for health endpoints
    stats: Arc<RwLock<MatchmakerStats>>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl Matchmaker {
    /// Create a new matchmaker
    pub fn new(settings: MatchmakingSettings, sink: Arc<dyn EventSink>) -> Self {
        // Create a default metrics collector if none provided
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(settings, sink, metrics_collector)
    }

    /// Create a new matchmaker with metrics collector
    pub fn with_metrics(
        settings: MatchmakingSettings,
        sink: Arc<dyn EventSink>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let policy = policy_for(settings.match_policy, settings.good_match_score);
        Self {
            registry: ConnectionRegistry::new(),
            profiles: ProfileStore::from_settings(&settings),
            queue: WaitingQueue::new(),
            sessions: SessionTable::new(),
            policy,
            settings,
            sink,
            stats: Arc::new(RwLock::new(MatchmakerStats::default())),
            metrics_collector,
        }
    }

    /// Replace the scoring policy
    pub fn with_policy(mut self, policy: Arc<dyn MatchPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// A transport connection opened
    pub fn connect(&mut self, connection_id: &str) -> Result<()> {
        if !self.registry.register(connection_id) {
            debug!("Connection {} already registered", connection_id);
            return Ok(());
        }

        info!(
            "Connection {} opened - online: {}",
            connection_id,
            self.registry.count()
        );
        self.metrics_collector.record_connect(self.registry.count());
        self.broadcast_online_count();
        self.refresh_stats()
    }

    /// A transport connection closed; tears down everything it owned
    pub fn disconnect(&mut self, connection_id: &str) -> Result<()> {
        if !self.registry.unregister(connection_id) {
            debug!("Disconnect for unknown connection {}", connection_id);
            return Ok(());
        }

        self.queue.remove(connection_id);
        if let Some(partner) = self.end_session(connection_id, LeaveReason::Disconnect)? {
            self.notify_partner_left(&partner, LeaveReason::Disconnect);
            self.requeue_partner(&partner);
        }
        self.profiles.remove(connection_id);

        info!(
            "Connection {} closed - online: {}",
            connection_id,
            self.registry.count()
        );
        self.metrics_collector
            .record_disconnect(self.registry.count());
        self.broadcast_online_count();
        self.run_match_pass()?;
        Ok(())
    }

    /// Set or update the display attributes of a connection
    pub fn update_profile(&mut self, connection_id: &str, payload: &ProfilePayload) -> Result<()> {
        if !self.registry.contains(connection_id) {
            debug!("Profile update for unknown connection {}", connection_id);
            return Ok(());
        }

        self.profiles.set_profile(
            connection_id,
            payload.name.as_deref(),
            payload.gender.as_deref(),
            payload.interests.as_slice(),
        );
        Ok(())
    }

    /// Enter the waiting queue and try to pair.
    ///
    /// While paired this behaves as [`Matchmaker::skip`]. While in cooldown
    /// the request is refused without touching any state. Otherwise the
    /// caller may be matched with its previous partner again.
    pub fn find(&mut self, connection_id: &str) -> Result<()> {
        if !self.registry.contains(connection_id) {
            debug!("Find from unknown connection {}", connection_id);
            return Ok(());
        }

        if self.profiles.is_in_cooldown(connection_id) {
            self.refuse_cooldown(connection_id);
            return Ok(());
        }

        if self.sessions.is_paired(connection_id) {
            return self.skip(connection_id);
        }

        // An explicit search lifts the exclusion left by the last session
        self.profiles.clear_recent_peer(connection_id);
        self.enqueue_and_notify(connection_id);
        self.run_match_pass()?;
        Ok(())
    }

    /// Leave the current session (if any) and look for a new partner.
    ///
    /// The skipper is queued ahead of the partner it left, so a connection
    /// already waiting is offered to the skipper first. The pair just split
    /// is kept apart until one of them searches again or meets someone else.
    pub fn skip(&mut self, connection_id: &str) -> Result<()> {
        if !self.registry.contains(connection_id) {
            debug!("Skip from unknown connection {}", connection_id);
            return Ok(());
        }

        let partner = self.end_session(connection_id, LeaveReason::Skip)?;
        match &partner {
            Some(partner) => self.notify_partner_left(partner, LeaveReason::Skip),
            None => self.profiles.clear_recent_peer(connection_id),
        }

        if self.profiles.is_in_cooldown(connection_id) {
            self.queue.remove(connection_id);
            self.refuse_cooldown(connection_id);
        } else {
            self.enqueue_and_notify(connection_id);
        }

        if let Some(partner) = &partner {
            self.requeue_partner(partner);
        }

        self.run_match_pass()?;
        Ok(())
    }

    /// Report the current partner and end the session.
    ///
    /// `reason` is expected to be already sanitized by the caller.
    pub fn report(&mut self, connection_id: &str, reason: &str) -> Result<()> {
        let Some(partner) = self.sessions.get_partner(connection_id).cloned() else {
            debug!("Report from unpaired connection {}", connection_id);
            self.record_drop("not_paired")?;
            return Ok(());
        };

        let outcome = self.profiles.record_report(&partner);
        info!(
            "Report from {} against {} - reason: '{}', count: {}",
            connection_id, partner, reason, outcome.count
        );
        self.metrics_collector
            .record_report(outcome.cooldown_applied);
        self.update_stats(|stats| {
            stats.reports_filed += 1;
            if outcome.cooldown_applied {
                stats.cooldowns_applied += 1;
            }
        })?;

        self.end_session(connection_id, LeaveReason::Report)?;
        self.notify_partner_left(&partner, LeaveReason::Report);
        self.send_system(connection_id, MSG_REPORT_ACK);

        if outcome.cooldown_applied {
            self.queue.remove(&partner);
            self.send_system(&partner, MSG_RESTRICTED);
        } else {
            self.requeue_partner(&partner);
        }

        self.run_match_pass()?;
        Ok(())
    }

    /// Block the current partner and end the session
    pub fn block(&mut self, connection_id: &str) -> Result<()> {
        let Some(partner) = self.sessions.get_partner(connection_id).cloned() else {
            debug!("Block from unpaired connection {}", connection_id);
            self.record_drop("not_paired")?;
            return Ok(());
        };

        self.profiles.block(connection_id, &partner);
        info!("Connection {} blocked {}", connection_id, partner);
        self.metrics_collector.record_block();
        self.update_stats(|stats| stats.blocks += 1)?;

        self.end_session(connection_id, LeaveReason::Block)?;
        self.notify_partner_left(&partner, LeaveReason::Block);
        self.send_system(connection_id, MSG_BLOCK_ACK);
        self.requeue_partner(&partner);

        self.run_match_pass()?;
        Ok(())
    }

    /// Pair waiting connections until the head of the queue has no partner.
    ///
    /// Returns the number of sessions created.
    pub fn run_match_pass(&mut self) -> Result<usize> {
        let timer = self.metrics_collector.start_timer();
        let now = current_timestamp();
        let mut created = 0;

        {
            let view = CandidateView {
                registry: &self.registry,
                profiles: &self.profiles,
                now,
            };
            self.queue.sweep(|id| view.is_eligible(id));
        }

        while self.queue.len() >= 2 {
            let Some(head) = self.queue.pop_front() else {
                break;
            };

            let best = {
                let view = CandidateView {
                    registry: &self.registry,
                    profiles: &self.profiles,
                    now,
                };
                self.queue
                    .find_best_match_for(&head.connection_id, self.policy.as_ref(), &view)
            };

            let Some(partner_id) = best else {
                debug!(
                    "No partner for {} among {} waiting",
                    head.connection_id,
                    self.queue.len()
                );
                self.queue.push_front(head);
                break;
            };

            let Some(partner) = self.queue.remove(&partner_id) else {
                self.queue.push_front(head);
                break;
            };

            match self.pair(&head, &partner, now) {
                Ok(_) => created += 1,
                Err(e) => error!(
                    "Failed to pair {} with {}: {}",
                    head.connection_id, partner.connection_id, e
                ),
            }
        }

        self.metrics_collector.record_match_pass(timer.stop());
        self.refresh_stats()?;
        Ok(created)
    }

    fn pair(
        &mut self,
        a: &WaitingEntry,
        b: &WaitingEntry,
        now: DateTime<Utc>,
    ) -> Result<SessionId> {
        let session_id = self.sessions.create(&a.connection_id, &b.connection_id)?;
        self.profiles.clear_recent_peer(&a.connection_id);
        self.profiles.clear_recent_peer(&b.connection_id);

        let a_public = self.profiles.public_profile(&a.connection_id);
        let b_public = self.profiles.public_profile(&b.connection_id);
        self.send(
            &a.connection_id,
            ServerEvent::Matched {
                session_id: session_id.clone(),
                partner: b_public,
            },
        );
        self.send(
            &b.connection_id,
            ServerEvent::Matched {
                session_id: session_id.clone(),
                partner: a_public,
            },
        );

        let waited = |entry: &WaitingEntry| (now - entry.enqueued_at).to_std().unwrap_or_default();
        self.metrics_collector
            .record_session_created(&[waited(a), waited(b)]);
        self.update_stats(|stats| stats.sessions_created += 1)?;

        info!(
            "Session {} created - {} <-> {} (policy: {})",
            session_id,
            a.connection_id,
            b.connection_id,
            self.policy.name()
        );
        Ok(session_id)
    }

    /// Remove the session of `connection_id` and return the partner
    fn end_session(
        &mut self,
        connection_id: &str,
        reason: LeaveReason,
    ) -> Result<Option<ConnectionId>> {
        let Some(session) = self.sessions.take(connection_id) else {
            return Ok(None);
        };
        let Some(partner) = session.partner_of(connection_id).cloned() else {
            return Ok(None);
        };

        self.profiles.set_recent_peers(connection_id, &partner);
        let lifetime = (current_timestamp() - session.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.metrics_collector.record_session_ended(reason, lifetime);
        self.update_stats(|stats| stats.sessions_ended += 1)?;

        info!(
            "Session {} ended by {} ({}) after {:.1}s",
            session.id,
            connection_id,
            reason,
            lifetime.as_secs_f64()
        );
        Ok(Some(partner))
    }

    fn notify_partner_left(&mut self, partner: &str, reason: LeaveReason) {
        self.send(
            partner,
            ServerEvent::PartnerLeft {
                reason: reason.into(),
            },
        );
    }

    /// Put the partner left behind back in the queue when configured to
    fn requeue_partner(&mut self, partner: &str) {
        if !self.settings.auto_requeue_partner {
            return;
        }
        if !self.registry.is_live(partner) || self.profiles.is_in_cooldown(partner) {
            debug!("Not re-queueing partner {}", partner);
            return;
        }
        self.enqueue_and_notify(partner);
    }

    fn enqueue_and_notify(&mut self, connection_id: &str) {
        if self.queue.enqueue(connection_id) {
            debug!("Connection {} re-queued at the tail", connection_id);
        }
        self.metrics_collector.record_enqueued(self.queue.len());
        self.send(connection_id, ServerEvent::Finding);
    }

    fn refuse_cooldown(&mut self, connection_id: &str) {
        info!("Find refused for {} - in cooldown", connection_id);
        self.metrics_collector.record_refusal("cooldown");
        self.send_system(connection_id, MSG_COOLDOWN_REFUSAL);
    }

    /// Deliver one event, marking the connection unreachable on failure
    pub fn send(&mut self, connection_id: &str, event: ServerEvent) -> bool {
        let name = event.name();
        if self.sink.send(connection_id, event) {
            return true;
        }

        warn!("Failed to send {} to {}", name, connection_id);
        self.metrics_collector.record_send_failure();
        self.registry.mark_unreachable(connection_id);
        false
    }

    /// Send a human-readable status line
    pub fn send_system(&mut self, connection_id: &str, msg: &str) -> bool {
        self.send(connection_id, ServerEvent::system(msg))
    }

    /// Send to both participants of a session, optionally skipping one.
    ///
    /// Returns the number of connections reached.
    pub fn send_to_session(
        &mut self,
        session_id: &str,
        event: ServerEvent,
        excluding: Option<&str>,
    ) -> usize {
        let Some(session) = self.sessions.session(session_id) else {
            return 0;
        };
        let targets: Vec<ConnectionId> = session
            .participants()
            .into_iter()
            .filter(|id| Some(id.as_str()) != excluding)
            .cloned()
            .collect();

        targets
            .iter()
            .filter(|id| self.send(id, event.clone()))
            .count()
    }

    /// Send the current online count to every live connection
    pub fn broadcast_online_count(&mut self) {
        let count = self.registry.count();
        for connection_id in self.registry.live_ids() {
            self.send(&connection_id, ServerEvent::OnlineCount { count });
        }
    }

    /// Count a relayed chat message
    pub fn record_relay(&mut self, kind: &str) -> Result<()> {
        self.metrics_collector.record_message_relayed(kind);
        self.update_stats(|stats| stats.messages_relayed += 1)
    }

    /// Count an inbound event dropped as a protocol violation
    pub fn record_drop(&mut self, reason: &str) -> Result<()> {
        self.metrics_collector.record_dropped(reason);
        self.update_stats(|stats| stats.events_dropped += 1)
    }

    /// Matchmaking state of a connection (`Idle` for unknown ids)
    pub fn state_of(&self, connection_id: &str) -> ParticipantState {
        if self.sessions.is_paired(connection_id) {
            ParticipantState::Paired
        } else if self.queue.contains(connection_id) {
            ParticipantState::Waiting
        } else {
            ParticipantState::Idle
        }
    }

    pub fn session_of(&self, connection_id: &str) -> Option<&Session> {
        self.sessions.get(connection_id)
    }

    pub fn partner_of(&self, connection_id: &str) -> Option<&ConnectionId> {
        self.sessions.get_partner(connection_id)
    }

    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.registry.contains(connection_id)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn queue(&self) -> &WaitingQueue {
        &self.queue
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Shared handle to the published statistics
    pub fn stats_handle(&self) -> Arc<RwLock<MatchmakerStats>> {
        self.stats.clone()
    }

    /// Get current matchmaker statistics
    pub fn get_stats(&self) -> Result<MatchmakerStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?;

        Ok(stats.clone())
    }

    fn update_stats<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut MatchmakerStats),
    {
        let mut stats = self
            .stats
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?;
        update(&mut stats);
        Ok(())
    }

    /// Publish the current gauges to the stats handle and metrics
    fn refresh_stats(&self) -> Result<()> {
        let online = self.registry.count();
        let waiting = self.queue.len();
        let active_sessions = self.sessions.len();

        self.update_stats(|stats| {
            stats.online = online;
            stats.waiting = waiting;
            stats.active_sessions = active_sessions;
            self.metrics_collector.update_from_stats(stats);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchPolicyKind;
    use crate::queue::FifoMatchPolicy;
    use crate::transport::publisher::MockEventSink;
    use crate::types::PartnerLeftReason;

    fn create_test_matchmaker() -> (Matchmaker, Arc<MockEventSink>) {
        create_matchmaker_with(MatchmakingSettings::default())
    }

    fn create_matchmaker_with(settings: MatchmakingSettings) -> (Matchmaker, Arc<MockEventSink>) {
        let sink = Arc::new(MockEventSink::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let matchmaker = Matchmaker::with_metrics(settings, sink.clone(), metrics);
        (matchmaker, sink)
    }

    fn connect_all(matchmaker: &mut Matchmaker, ids: &[&str]) {
        for id in ids {
            matchmaker.connect(id).unwrap();
        }
    }

    fn profile(name: &str, gender: &str, interests: &[&str]) -> ProfilePayload {
        ProfilePayload {
            name: Some(name.to_string()),
            gender: Some(gender.to_string()),
            interests: interests.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn matched_partner(sink: &MockEventSink, id: &str) -> Option<(SessionId, String)> {
        sink.events_for(id).into_iter().rev().find_map(|event| match event {
            ServerEvent::Matched {
                session_id,
                partner,
            } => Some((session_id, partner.name)),
            _ => None,
        })
    }

    #[test]
    fn test_two_finds_are_paired() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b"]);
        mm.update_profile("a", &profile("Ana", "f", &[])).unwrap();
        mm.update_profile("b", &profile("Ben", "m", &[])).unwrap();

        mm.find("a").unwrap();
        assert_eq!(mm.state_of("a"), ParticipantState::Waiting);
        mm.find("b").unwrap();

        assert_eq!(mm.state_of("a"), ParticipantState::Paired);
        assert_eq!(mm.state_of("b"), ParticipantState::Paired);
        assert!(mm.queue().is_empty());

        let (session_a, partner_of_a) = matched_partner(&sink, "a").unwrap();
        let (session_b, partner_of_b) = matched_partner(&sink, "b").unwrap();
        assert_eq!(session_a, session_b);
        assert_eq!(partner_of_a, "Ben");
        assert_eq!(partner_of_b, "Ana");
        assert_eq!(sink.count_for("a", "finding"), 1);
    }

    #[test]
    fn test_find_while_waiting_keeps_single_entry() {
        let (mut mm, _sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a"]);
        mm.find("a").unwrap();
        mm.find("a").unwrap();
        assert_eq!(mm.queue().len(), 1);
    }

    #[test]
    fn test_lone_connection_is_never_self_matched() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a"]);
        mm.find("a").unwrap();
        mm.find("a").unwrap();
        assert_eq!(mm.run_match_pass().unwrap(), 0);
        assert_eq!(sink.count_for("a", "matched"), 0);
    }

    #[test]
    fn test_unknown_connection_is_ignored() {
        let (mut mm, sink) = create_test_matchmaker();
        mm.find("ghost").unwrap();
        mm.skip("ghost").unwrap();
        mm.disconnect("ghost").unwrap();
        assert!(mm.queue().is_empty());
        assert!(sink.sent_events().is_empty());
    }

    #[test]
    fn test_skip_pairs_skipper_with_waiting_connection() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b", "c"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();
        mm.find("c").unwrap();
        assert_eq!(mm.state_of("c"), ParticipantState::Waiting);

        mm.skip("a").unwrap();

        assert_eq!(
            sink.events_for("b")
                .into_iter()
                .filter(|e| matches!(
                    e,
                    ServerEvent::PartnerLeft {
                        reason: PartnerLeftReason::Left
                    }
                ))
                .count(),
            1
        );
        assert_eq!(mm.partner_of("a").map(String::as_str), Some("c"));
        assert_eq!(mm.state_of("b"), ParticipantState::Waiting);
    }

    #[test]
    fn test_skipped_pair_is_not_rematched_immediately() {
        let (mut mm, _sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();

        mm.skip("a").unwrap();
        assert_eq!(mm.state_of("a"), ParticipantState::Waiting);
        assert_eq!(mm.state_of("b"), ParticipantState::Waiting);

        // a new arrival breaks the stalemate
        connect_all(&mut mm, &["c"]);
        mm.find("c").unwrap();
        assert_eq!(mm.partner_of("a").map(String::as_str), Some("c"));
    }

    #[test]
    fn test_explicit_find_allows_rematch_after_skip() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();
        mm.skip("a").unwrap();
        assert!(mm.sessions().is_empty());

        mm.find("b").unwrap();
        assert_eq!(mm.partner_of("a").map(String::as_str), Some("b"));
        assert_eq!(sink.count_for("a", "matched"), 2);
    }

    #[test]
    fn test_skip_while_waiting_allows_rematch() {
        let (mut mm, _sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();
        mm.skip("b").unwrap();
        assert_eq!(mm.state_of("a"), ParticipantState::Waiting);

        mm.skip("a").unwrap();
        assert_eq!(mm.partner_of("b").map(String::as_str), Some("a"));
    }

    #[test]
    fn test_find_while_paired_acts_as_skip() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();

        mm.find("a").unwrap();
        assert_eq!(sink.count_for("b", "partner_left"), 1);
        assert!(mm.sessions().is_empty());
    }

    #[test]
    fn test_partner_stays_idle_without_auto_requeue() {
        let settings = MatchmakingSettings {
            auto_requeue_partner: false,
            ..Default::default()
        };
        let (mut mm, sink) = create_matchmaker_with(settings);
        connect_all(&mut mm, &["a", "b"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();
        sink.clear();

        mm.skip("a").unwrap();
        assert_eq!(mm.state_of("b"), ParticipantState::Idle);
        assert_eq!(sink.count_for("b", "finding"), 0);
        assert_eq!(mm.state_of("a"), ParticipantState::Waiting);
    }

    #[test]
    fn test_disconnect_cascade() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();
        sink.clear();

        mm.disconnect("a").unwrap();

        let b_events = sink.events_for("b");
        assert_eq!(
            b_events
                .iter()
                .filter(|e| **e
                    == ServerEvent::PartnerLeft {
                        reason: PartnerLeftReason::Disconnected
                    })
                .count(),
            1
        );
        assert_eq!(sink.count_for("b", "finding"), 1);
        assert_eq!(mm.queue().ids(), vec!["b"]);
        assert!(mm.profiles().get_profile("a").is_none());
        assert!(!mm.is_connected("a"));
        assert!(b_events.contains(&ServerEvent::OnlineCount { count: 1 }));

        // a second disconnect notification changes nothing
        mm.disconnect("a").unwrap();
        assert_eq!(sink.count_for("b", "partner_left"), 1);
    }

    #[test]
    fn test_block_keeps_pair_apart_both_ways() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();

        mm.block("a").unwrap();
        assert_eq!(
            sink.events_for("a").last(),
            Some(&ServerEvent::system(MSG_BLOCK_ACK))
        );
        assert_eq!(mm.state_of("a"), ParticipantState::Idle);
        assert_eq!(mm.state_of("b"), ParticipantState::Waiting);

        // neither order of find pairs them again
        mm.find("a").unwrap();
        assert!(mm.sessions().is_empty());
        mm.skip("b").unwrap();
        assert!(mm.sessions().is_empty());
        assert_eq!(mm.profiles().get_profile("b").map(|p| p.report_count), Some(0));
    }

    #[test]
    fn test_report_threshold_applies_cooldown() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["t", "r1", "r2", "r3"]);

        for reporter in ["r1", "r2", "r3"] {
            mm.find(reporter).unwrap();
            if mm.state_of("t") == ParticipantState::Idle {
                mm.find("t").unwrap();
            }
            assert_eq!(mm.partner_of("t").map(String::as_str), Some(reporter));
            mm.report(reporter, "rude").unwrap();
            assert!(mm.sessions().is_empty());
            assert_eq!(mm.state_of(reporter), ParticipantState::Idle);
            assert_eq!(
                sink.events_for(reporter).last(),
                Some(&ServerEvent::system(MSG_REPORT_ACK))
            );
        }

        assert!(mm.profiles().is_in_cooldown("t"));
        assert_eq!(mm.state_of("t"), ParticipantState::Idle);
        assert_eq!(
            sink.events_for("t").last(),
            Some(&ServerEvent::system(MSG_RESTRICTED))
        );

        let stats = mm.get_stats().unwrap();
        assert_eq!(stats.reports_filed, 3);
        assert_eq!(stats.cooldowns_applied, 1);
        assert_eq!(stats.sessions_ended, 3);

        // cooled-down connections are refused without state change
        mm.find("t").unwrap();
        assert_eq!(mm.state_of("t"), ParticipantState::Idle);
        assert_eq!(
            sink.events_for("t").last(),
            Some(&ServerEvent::system(MSG_COOLDOWN_REFUSAL))
        );
    }

    #[test]
    fn test_report_below_threshold_requeues_target() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();

        mm.report("a", "spam").unwrap();
        assert_eq!(
            sink.events_for("b")
                .iter()
                .filter(|e| **e
                    == ServerEvent::PartnerLeft {
                        reason: PartnerLeftReason::Ended
                    })
                .count(),
            1
        );
        assert_eq!(mm.state_of("b"), ParticipantState::Waiting);
        assert_eq!(mm.profiles().get_profile("b").map(|p| p.report_count), Some(1));
    }

    #[test]
    fn test_report_and_block_require_session() {
        let (mut mm, _sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a"]);
        mm.report("a", "x").unwrap();
        mm.block("a").unwrap();
        assert_eq!(mm.get_stats().unwrap().events_dropped, 2);
        assert_eq!(mm.get_stats().unwrap().reports_filed, 0);
    }

    #[test]
    fn test_interest_policy_prefers_shared_tags() {
        let (mut mm, _sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b", "c"]);
        mm.update_profile("a", &profile("A", "", &["chess", "jazz"])).unwrap();
        mm.update_profile("b", &profile("B", "", &["football"])).unwrap();
        mm.update_profile("c", &profile("C", "", &["jazz", "chess"])).unwrap();

        for id in ["a", "b", "c"] {
            mm.queue.enqueue(id);
        }
        assert_eq!(mm.run_match_pass().unwrap(), 1);

        assert_eq!(mm.partner_of("a").map(String::as_str), Some("c"));
        assert_eq!(mm.state_of("b"), ParticipantState::Waiting);
    }

    #[test]
    fn test_fifo_policy_ignores_interests() {
        let settings = MatchmakingSettings {
            match_policy: MatchPolicyKind::Fifo,
            ..Default::default()
        };
        let (mut mm, _sink) = create_matchmaker_with(settings);
        assert_eq!(mm.policy_name(), "fifo");

        connect_all(&mut mm, &["a", "b", "c"]);
        mm.update_profile("a", &profile("A", "", &["chess"])).unwrap();
        mm.update_profile("c", &profile("C", "", &["chess"])).unwrap();
        for id in ["a", "b", "c"] {
            mm.queue.enqueue(id);
        }
        mm.run_match_pass().unwrap();

        assert_eq!(mm.partner_of("a").map(String::as_str), Some("b"));
    }

    #[test]
    fn test_with_policy_overrides_configured_policy() {
        let (mm, _sink) = create_test_matchmaker();
        assert_eq!(mm.policy_name(), "interest");
        let mm = mm.with_policy(Arc::new(FifoMatchPolicy));
        assert_eq!(mm.policy_name(), "fifo");
    }

    #[test]
    fn test_failed_send_marks_connection_unreachable() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b"]);
        sink.fail_for("a");

        mm.find("a").unwrap();
        assert!(!mm.registry().is_live("a"));

        // unreachable entries are swept instead of matched
        mm.find("b").unwrap();
        assert!(mm.sessions().is_empty());
        assert_eq!(mm.queue().ids(), vec!["b"]);
    }

    #[test]
    fn test_stats_track_gauges() {
        let (mut mm, _sink) = create_test_matchmaker();
        let handle = mm.stats_handle();
        connect_all(&mut mm, &["a", "b", "c"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();
        mm.find("c").unwrap();

        let stats = handle.read().unwrap().clone();
        assert_eq!(stats.online, 3);
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.sessions_created, 1);
    }

    #[test]
    fn test_send_to_session_excludes_sender() {
        let (mut mm, sink) = create_test_matchmaker();
        connect_all(&mut mm, &["a", "b"]);
        mm.find("a").unwrap();
        mm.find("b").unwrap();
        let session_id = mm.session_of("a").unwrap().id.clone();
        sink.clear();

        let reached =
            mm.send_to_session(&session_id, ServerEvent::Typing { typing: true }, Some("a"));
        assert_eq!(reached, 1);
        assert_eq!(sink.count_for("b", "typing"), 1);
        assert_eq!(sink.count_for("a", "typing"), 0);
        assert_eq!(mm.send_to_session("room_x_y", ServerEvent::Finding, None), 0);
    }
}
