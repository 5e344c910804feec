//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use stranger_room::config::{MatchmakingSettings, RelaySettings};
use stranger_room::metrics::MetricsCollector;
use stranger_room::transport::{encode_server_event, EventSink};
use stranger_room::types::{
    ClientEvent, ConnectionId, MessagePayload, ProfilePayload, PublicProfile, ServerEvent,
    SessionId, TransportEvent,
};
use stranger_room::{EventRouter, Matchmaker};

/// Event sink that records every delivery together with its wire encoding
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    delivered: Mutex<Vec<(ConnectionId, ServerEvent, String)>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received by one connection, in order
    pub fn events_for(&self, connection_id: &str) -> Vec<ServerEvent> {
        self.delivered
            .lock()
            .map(|delivered| {
                delivered
                    .iter()
                    .filter(|(id, _, _)| id == connection_id)
                    .map(|(_, event, _)| event.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// JSON frames as they would have been written to the socket
    pub fn frames_for(&self, connection_id: &str) -> Vec<String> {
        self.delivered
            .lock()
            .map(|delivered| {
                delivered
                    .iter()
                    .filter(|(id, _, _)| id == connection_id)
                    .map(|(_, _, frame)| frame.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Count events of a specific name received by one connection
    pub fn count_for(&self, connection_id: &str, name: &str) -> usize {
        self.events_for(connection_id)
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }

    /// Partner profile from the latest `matched` event of a connection
    pub fn last_match(&self, connection_id: &str) -> Option<(SessionId, PublicProfile)> {
        self.events_for(connection_id)
            .into_iter()
            .rev()
            .find_map(|event| match event {
                ServerEvent::Matched {
                    session_id,
                    partner,
                } => Some((session_id, partner)),
                _ => None,
            })
    }

    /// Text of every `system` event a connection received
    pub fn system_messages(&self, connection_id: &str) -> Vec<String> {
        self.events_for(connection_id)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::System { msg } => Some(msg),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.clear();
        }
    }
}

impl EventSink for RecordingEventSink {
    fn send(&self, connection_id: &str, event: ServerEvent) -> bool {
        let frame = encode_server_event(&event).unwrap_or_default();
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push((connection_id.to_string(), event, frame));
        }
        true
    }

    fn broadcast(&self, _event: ServerEvent) -> usize {
        0
    }
}

/// Integration test setup that creates a complete core
pub fn create_test_system(settings: MatchmakingSettings) -> (EventRouter, Arc<RecordingEventSink>) {
    let sink = Arc::new(RecordingEventSink::new());
    let metrics = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
    let matchmaker = Matchmaker::with_metrics(settings, sink.clone(), metrics.clone());
    let router = EventRouter::new(matchmaker, RelaySettings::default(), metrics);
    (router, sink)
}

pub fn connect(router: &mut EventRouter, connection_id: &str) {
    router
        .handle(TransportEvent::Connected(connection_id.to_string()))
        .expect("connect failed");
}

pub fn disconnect(router: &mut EventRouter, connection_id: &str) {
    router
        .handle(TransportEvent::Disconnected(connection_id.to_string()))
        .expect("disconnect failed");
}

pub fn send(router: &mut EventRouter, connection_id: &str, event: ClientEvent) {
    router
        .handle(TransportEvent::Event {
            connection_id: connection_id.to_string(),
            event,
        })
        .expect("event failed");
}

/// Connect, set a profile and start looking for a partner
pub fn join_and_find(router: &mut EventRouter, connection_id: &str, profile: ProfilePayload) {
    connect(router, connection_id);
    send(router, connection_id, ClientEvent::Profile(profile));
    send(router, connection_id, ClientEvent::Find);
}

pub fn profile(name: &str, gender: &str, interests: &[&str]) -> ProfilePayload {
    ProfilePayload {
        name: Some(name.to_string()),
        gender: Some(gender.to_string()),
        interests: interests.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn text_message(text: &str) -> ClientEvent {
    ClientEvent::Message(MessagePayload {
        text: Some(text.to_string()),
        ..Default::default()
    })
}
