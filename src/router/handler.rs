//! Inbound event routing
//!
//! The router is the entry point of the core. It validates each client event
//! against the sender's session state, relays chat traffic to the partner
//! and delegates lifecycle events to the [`Matchmaker`].

use crate::config::RelaySettings;
use crate::error::Result;
use crate::matchmaker::{Matchmaker, MSG_NOT_CONNECTED};
use crate::metrics::MetricsCollector;
use crate::types::{
    ClientEvent, ConnectionId, MessagePayload, RelayBody, RelayedMessage, ServerEvent,
    TransportEvent, TypingPayload,
};
use crate::utils::{current_timestamp, sanitize_text, truncate_chars};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const UNSPECIFIED_REASON: &str = "unspecified";

/// Why an inbound event was not acted upon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownConnection,
    NotPaired,
    StaleSession,
    EmptyMessage,
    UnknownKind,
    Throttled,
}

impl DropReason {
    /// Label used for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::UnknownConnection => "unknown_connection",
            DropReason::NotPaired => "not_paired",
            DropReason::StaleSession => "stale_session",
            DropReason::EmptyMessage => "empty_message",
            DropReason::UnknownKind => "unknown_kind",
            DropReason::Throttled => "throttled",
        }
    }
}

/// Validate a chat message against the sender's session and relay limits.
///
/// A declared session id must match `session_id`. Text is trimmed,
/// truncated and stripped of control characters; GIF urls are truncated and
/// otherwise passed through untouched.
pub fn validate_message(
    payload: &MessagePayload,
    settings: &RelaySettings,
    session_id: &str,
) -> std::result::Result<RelayBody, DropReason> {
    if let Some(declared) = payload.session_id.as_deref() {
        if declared != session_id {
            return Err(DropReason::StaleSession);
        }
    }

    match payload.kind.as_deref().unwrap_or("text") {
        "text" => {
            let raw = payload.text.as_deref().unwrap_or_default();
            sanitize_text(raw, settings.max_message_chars)
                .map(|text| RelayBody::Text { text })
                .ok_or(DropReason::EmptyMessage)
        }
        "gif" => {
            let raw = payload.url.as_deref().unwrap_or_default().trim();
            let url = truncate_chars(raw, settings.max_media_url_chars);
            if url.is_empty() {
                Err(DropReason::EmptyMessage)
            } else {
                Ok(RelayBody::Gif { url })
            }
        }
        _ => Err(DropReason::UnknownKind),
    }
}

/// Last typing signal relayed for a sender
#[derive(Debug, Clone, Copy)]
struct TypingMark {
    at: Instant,
    typing: bool,
}

/// Routes transport notifications into the matchmaker
pub struct EventRouter {
    matchmaker: Matchmaker,
    relay: RelaySettings,
    last_typing: HashMap<ConnectionId, TypingMark>,
    metrics_collector: Arc<MetricsCollector>,
}

impl EventRouter {
    pub fn new(
        matchmaker: Matchmaker,
        relay: RelaySettings,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            matchmaker,
            relay,
            last_typing: HashMap::new(),
            metrics_collector,
        }
    }

    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    pub fn matchmaker_mut(&mut self) -> &mut Matchmaker {
        &mut self.matchmaker
    }

    /// Handle one notification to completion
    pub fn handle(&mut self, event: TransportEvent) -> Result<()> {
        let start_time = Instant::now();
        let name = match &event {
            TransportEvent::Connected(_) => "connect",
            TransportEvent::Event { event, .. } => event.name(),
            TransportEvent::Disconnected(_) => "disconnect",
        };

        let result = match event {
            TransportEvent::Connected(connection_id) => self.matchmaker.connect(&connection_id),
            TransportEvent::Disconnected(connection_id) => {
                self.last_typing.remove(&connection_id);
                self.matchmaker.disconnect(&connection_id)
            }
            TransportEvent::Event {
                connection_id,
                event,
            } => self.handle_client_event(&connection_id, event),
        };

        self.metrics_collector
            .record_event(name, start_time.elapsed());
        result
    }

    fn handle_client_event(&mut self, connection_id: &str, event: ClientEvent) -> Result<()> {
        if !self.matchmaker.is_connected(connection_id) {
            return self.drop_event(connection_id, event.name(), DropReason::UnknownConnection);
        }

        match event {
            ClientEvent::Profile(payload) => self.matchmaker.update_profile(connection_id, &payload),
            ClientEvent::Find => self.matchmaker.find(connection_id),
            ClientEvent::Skip => self.matchmaker.skip(connection_id),
            ClientEvent::Message(payload) => self.relay_message(connection_id, &payload),
            ClientEvent::Typing(payload) => {
                self.relay_typing_at(connection_id, &payload, Instant::now())
            }
            ClientEvent::Block => self.matchmaker.block(connection_id),
            ClientEvent::Report(payload) => {
                let reason = payload
                    .reason
                    .as_deref()
                    .and_then(|r| sanitize_text(r, self.relay.max_report_reason_chars))
                    .unwrap_or_else(|| UNSPECIFIED_REASON.to_string());
                self.matchmaker.report(connection_id, &reason)
            }
        }
    }

    /// Relay a chat message to the sender's partner
    fn relay_message(&mut self, connection_id: &str, payload: &MessagePayload) -> Result<()> {
        let Some(session_id) = self
            .matchmaker
            .session_of(connection_id)
            .map(|session| session.id.clone())
        else {
            self.matchmaker.send_system(connection_id, MSG_NOT_CONNECTED);
            return self.drop_event(connection_id, "message", DropReason::NotPaired);
        };

        let body = match validate_message(payload, &self.relay, &session_id) {
            Ok(body) => body,
            Err(reason) => return self.drop_event(connection_id, "message", reason),
        };

        let kind = body.kind();
        let relayed = ServerEvent::Message(RelayedMessage {
            body,
            from: connection_id.to_string(),
            ts: current_timestamp().timestamp_millis(),
        });
        if self
            .matchmaker
            .send_to_session(&session_id, relayed, Some(connection_id))
            > 0
        {
            self.matchmaker.record_relay(kind)?;
        }
        Ok(())
    }

    /// Relay a typing signal, dropping repeats inside the throttle window.
    ///
    /// A change of state (typing to not typing or back) is always relayed.
    pub fn relay_typing_at(
        &mut self,
        connection_id: &str,
        payload: &TypingPayload,
        now: Instant,
    ) -> Result<()> {
        let Some(session_id) = self
            .matchmaker
            .session_of(connection_id)
            .map(|session| session.id.clone())
        else {
            return self.drop_event(connection_id, "typing", DropReason::NotPaired);
        };

        let min_interval = Duration::from_millis(self.relay.typing_min_interval_ms);
        if let Some(mark) = self.last_typing.get(connection_id) {
            if mark.typing == payload.typing && now.duration_since(mark.at) < min_interval {
                return self.drop_event(connection_id, "typing", DropReason::Throttled);
            }
        }

        self.last_typing.insert(
            connection_id.to_string(),
            TypingMark {
                at: now,
                typing: payload.typing,
            },
        );
        let event = ServerEvent::Typing {
            typing: payload.typing,
        };
        if self
            .matchmaker
            .send_to_session(&session_id, event, Some(connection_id))
            > 0
        {
            self.metrics_collector.record_typing_relayed();
        }
        Ok(())
    }

    fn drop_event(&mut self, connection_id: &str, event: &str, reason: DropReason) -> Result<()> {
        debug!(
            "Dropping {} from {}: {}",
            event,
            connection_id,
            reason.as_str()
        );
        self.matchmaker.record_drop(reason.as_str())
    }
}
