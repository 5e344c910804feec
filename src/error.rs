//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Invalid event: {reason}")]
    InvalidEvent { reason: String },

    #[error("Connection already paired: {connection_id}")]
    AlreadyPaired { connection_id: String },

    #[error("Connection cannot be paired with itself: {connection_id}")]
    SelfMatch { connection_id: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
