//! Active sessions between pairs of connections
//!
//! Each session binds exactly two connections. Both directions of the binding
//! are indexed so either participant can find its partner, and a connection
//! can belong to at most one session at a time.

use crate::error::{MatchmakingError, Result};
use crate::types::{ConnectionId, SessionId};
use crate::utils::{current_timestamp, session_id_for};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

/// A pairing of two connections
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub participant_a: ConnectionId,
    pub participant_b: ConnectionId,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// The other participant, if `connection_id` is part of this session
    pub fn partner_of(&self, connection_id: &str) -> Option<&ConnectionId> {
        if self.participant_a == connection_id {
            Some(&self.participant_b)
        } else if self.participant_b == connection_id {
            Some(&self.participant_a)
        } else {
            None
        }
    }

    pub fn participants(&self) -> [&ConnectionId; 2] {
        [&self.participant_a, &self.participant_b]
    }
}

/// Table of all active sessions
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SessionId, Session>,
    by_connection: HashMap<ConnectionId, SessionId>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind two connections into a new session.
    ///
    /// Refused when both ids are equal or either side is already paired.
    pub fn create(&mut self, a: &str, b: &str) -> Result<SessionId> {
        if a == b {
            return Err(MatchmakingError::SelfMatch {
                connection_id: a.to_string(),
            }
            .into());
        }
        for id in [a, b] {
            if self.by_connection.contains_key(id) {
                return Err(MatchmakingError::AlreadyPaired {
                    connection_id: id.to_string(),
                }
                .into());
            }
        }

        let session_id = session_id_for(a, b);
        let session = Session {
            id: session_id.clone(),
            participant_a: a.to_string(),
            participant_b: b.to_string(),
            created_at: current_timestamp(),
        };

        self.by_connection.insert(a.to_string(), session_id.clone());
        self.by_connection.insert(b.to_string(), session_id.clone());
        self.sessions.insert(session_id.clone(), session);

        debug!("Session {} created for {} and {}", session_id, a, b);
        Ok(session_id)
    }

    pub fn get_partner(&self, connection_id: &str) -> Option<&ConnectionId> {
        self.get(connection_id)
            .and_then(|session| session.partner_of(connection_id))
    }

    pub fn get_session(&self, connection_id: &str) -> Option<&SessionId> {
        self.by_connection.get(connection_id)
    }

    /// Session record of a connection
    pub fn get(&self, connection_id: &str) -> Option<&Session> {
        self.by_connection
            .get(connection_id)
            .and_then(|session_id| self.sessions.get(session_id))
    }

    /// Session record by id
    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn is_paired(&self, connection_id: &str) -> bool {
        self.by_connection.contains_key(connection_id)
    }

    /// Remove the session of `connection_id`, clearing both directions.
    ///
    /// Returns the removed session; `None` when there was nothing to remove.
    pub fn take(&mut self, connection_id: &str) -> Option<Session> {
        let session_id = self.by_connection.remove(connection_id)?;
        let session = self.sessions.remove(&session_id)?;
        if let Some(partner) = session.partner_of(connection_id) {
            self.by_connection.remove(partner);
        }
        debug!("Session {} destroyed by {}", session_id, connection_id);
        Some(session)
    }

    /// Remove the session of `connection_id` and return the partner to notify
    pub fn destroy(&mut self, connection_id: &str) -> Option<ConnectionId> {
        self.take(connection_id)
            .and_then(|session| session.partner_of(connection_id).cloned())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
