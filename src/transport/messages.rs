//! Wire codec for client and server events
//!
//! Every frame is a JSON text object `{"event": <name>, "data": <payload>}`.
//! `data` may be missing or null for events without a payload.

use crate::error::{MatchmakingError, Result};
use crate::types::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Largest inbound text frame accepted by the transport
pub const MAX_FRAME_BYTES: usize = 16 * 1024;

/// Envelope as received before the event name is resolved
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode one inbound text frame into a client event
pub fn decode_client_event(text: &str) -> Result<ClientEvent> {
    if text.len() > MAX_FRAME_BYTES {
        return Err(MatchmakingError::InvalidEvent {
            reason: format!("Frame of {} bytes exceeds limit", text.len()),
        }
        .into());
    }

    let envelope: RawEnvelope =
        serde_json::from_str(text).map_err(|e| MatchmakingError::InvalidEvent {
            reason: format!("Failed to deserialize frame: {}", e),
        })?;

    let event = match envelope.event.as_str() {
        "join" | "profile" => ClientEvent::Profile(payload(envelope.data)?),
        "find" => ClientEvent::Find,
        "skip" | "next" => ClientEvent::Skip,
        "message" => ClientEvent::Message(payload(envelope.data)?),
        "typing" => ClientEvent::Typing(payload(envelope.data)?),
        "block" => ClientEvent::Block,
        "report" => ClientEvent::Report(payload(envelope.data)?),
        other => {
            return Err(MatchmakingError::InvalidEvent {
                reason: format!("Unknown event name '{}'", other),
            }
            .into())
        }
    };

    Ok(event)
}

fn payload<T: DeserializeOwned + Default>(data: serde_json::Value) -> Result<T> {
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data).map_err(|e| {
        MatchmakingError::InvalidEvent {
            reason: format!("Invalid payload: {}", e),
        }
        .into()
    })
}

/// Encode an outbound event as a text frame
pub fn encode_server_event(event: &ServerEvent) -> Result<String> {
    serde_json::to_string(event).map_err(|e| {
        MatchmakingError::InternalError {
            message: format!("Failed to serialize {} event: {}", event.name(), e),
        }
        .into()
    })
}
