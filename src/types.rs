//! Common types used throughout the matchmaking service

use serde::{Deserialize, Serialize};

/// Unique identifier for a transport connection
pub type ConnectionId = String;

/// Unique identifier for a session between two connections
pub type SessionId = String;

/// Matchmaking state of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantState {
    Idle,
    Waiting,
    Paired,
}

impl std::fmt::Display for ParticipantState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipantState::Idle => write!(f, "Idle"),
            ParticipantState::Waiting => write!(f, "Waiting"),
            ParticipantState::Paired => write!(f, "Paired"),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    Skip,
    Disconnect,
    Block,
    Report,
}

impl LeaveReason {
    /// Label used for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveReason::Skip => "skip",
            LeaveReason::Disconnect => "disconnect",
            LeaveReason::Block => "block",
            LeaveReason::Report => "report",
        }
    }
}

impl std::fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason shown to the participant left behind.
///
/// Moderation outcomes (block, report) are reported as a plain `ended` so the
/// remaining side never learns it was blocked or reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerLeftReason {
    Left,
    Disconnected,
    Ended,
}

impl From<LeaveReason> for PartnerLeftReason {
    fn from(reason: LeaveReason) -> Self {
        match reason {
            LeaveReason::Skip => PartnerLeftReason::Left,
            LeaveReason::Disconnect => PartnerLeftReason::Disconnected,
            LeaveReason::Block | LeaveReason::Report => PartnerLeftReason::Ended,
        }
    }
}

/// The part of a profile that may be shown to a matched partner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub name: String,
    pub gender: String,
}

impl Default for PublicProfile {
    fn default() -> Self {
        Self {
            name: crate::utils::DEFAULT_DISPLAY_NAME.to_string(),
            gender: String::new(),
        }
    }
}

// Inbound Message Types

/// Profile update sent with `join` or `profile`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

/// Chat message sent by a paired participant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Session the client believes it is in; checked when present
    #[serde(default, alias = "roomId", alias = "room_id")]
    pub session_id: Option<SessionId>,
    /// `text` (default) or `gif`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, alias = "msg")]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Typing indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingPayload {
    #[serde(default = "default_typing")]
    pub typing: bool,
}

fn default_typing() -> bool {
    true
}

impl Default for TypingPayload {
    fn default() -> Self {
        Self { typing: true }
    }
}

/// Report against the current partner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Closed set of events a client may send
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// `join` or `profile`
    Profile(ProfilePayload),
    Find,
    /// `skip` or `next`
    Skip,
    Message(MessagePayload),
    Typing(TypingPayload),
    Block,
    Report(ReportPayload),
}

impl ClientEvent {
    /// Canonical event name
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Profile(_) => "profile",
            ClientEvent::Find => "find",
            ClientEvent::Skip => "skip",
            ClientEvent::Message(_) => "message",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::Block => "block",
            ClientEvent::Report(_) => "report",
        }
    }
}

// Outbound Message Types

/// Relayed chat content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayBody {
    Text { text: String },
    Gif { url: String },
}

impl RelayBody {
    /// Label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RelayBody::Text { .. } => "text",
            RelayBody::Gif { .. } => "gif",
        }
    }
}

/// A message as delivered to the receiving partner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayedMessage {
    #[serde(flatten)]
    pub body: RelayBody,
    pub from: ConnectionId,
    /// Milliseconds since the Unix epoch
    pub ts: i64,
}

/// Closed set of events the service sends to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Matched {
        session_id: SessionId,
        partner: PublicProfile,
    },
    Finding,
    Message(RelayedMessage),
    Typing {
        typing: bool,
    },
    PartnerLeft {
        reason: PartnerLeftReason,
    },
    OnlineCount {
        count: usize,
    },
    System {
        msg: String,
    },
}

impl ServerEvent {
    /// Canonical event name
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Matched { .. } => "matched",
            ServerEvent::Finding => "finding",
            ServerEvent::Message(_) => "message",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::PartnerLeft { .. } => "partner_left",
            ServerEvent::OnlineCount { .. } => "online_count",
            ServerEvent::System { .. } => "system",
        }
    }

    /// Convenience constructor for status lines
    pub fn system(msg: impl Into<String>) -> Self {
        ServerEvent::System { msg: msg.into() }
    }
}

/// Notifications the transport feeds into the core
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected(ConnectionId),
    Event {
        connection_id: ConnectionId,
        event: ClientEvent,
    },
    Disconnected(ConnectionId),
}

impl TransportEvent {
    /// Connection the notification belongs to
    pub fn connection_id(&self) -> &str {
        match self {
            TransportEvent::Connected(id) | TransportEvent::Disconnected(id) => id,
            TransportEvent::Event { connection_id, .. } => connection_id,
        }
    }
}
