//! Utility functions for the matchmaking service

use crate::types::{ConnectionId, SessionId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Display name used when a participant never set one
pub const DEFAULT_DISPLAY_NAME: &str = "anonymous";

/// Generate a new unique connection ID
pub fn generate_connection_id() -> ConnectionId {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Derive the session ID for a pair of connections.
///
/// The ids are sorted first so both orderings produce the same session.
pub fn session_id_for(a: &str, b: &str) -> SessionId {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("room_{}_{}", first, second)
}

/// Truncate to at most `max_chars` characters, never splitting a code point
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

/// Remove C0 control characters and DEL
pub fn strip_control_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(*c, '\u{0000}'..='\u{001F}' | '\u{007F}'))
        .collect()
}

/// Trim, truncate and strip control characters from a chat message.
///
/// Returns `None` when nothing printable is left.
pub fn sanitize_text(raw: &str, max_chars: usize) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cleaned = strip_control_chars(&truncate_chars(trimmed, max_chars));
    if cleaned.trim().is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Lower-case, trim and de-duplicate interest tags, keeping at most `max_tags`
pub fn normalize_interests<S: AsRef<str>>(raw: &[S], max_tags: usize) -> Vec<String> {
    let mut interests: Vec<String> = Vec::with_capacity(max_tags);
    for tag in raw {
        let tag = tag.as_ref().trim().to_lowercase();
        if tag.is_empty() || interests.contains(&tag) {
            continue;
        }
        interests.push(tag);
        if interests.len() == max_tags {
            break;
        }
    }
    interests
}

/// Count interests present in both lists (0 if either is empty)
pub fn shared_interest_count(a: &[String], b: &[String]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    b.iter().filter(|tag| a.contains(tag)).count()
}
