//! Stranger Room - Matchmaking and relay service for anonymous chat
//!
//! This crate pairs anonymous chat participants, keeps the waiting queue and
//! session table consistent, and relays messages and typing signals between
//! matched strangers over a WebSocket transport.

pub mod config;
pub mod connection;
pub mod error;
pub mod matchmaker;
pub mod metrics;
pub mod profile;
pub mod queue;
pub mod router;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use matchmaker::Matchmaker;
pub use queue::{FifoMatchPolicy, InterestMatchPolicy, MatchPolicy};
pub use router::EventRouter;
pub use transport::publisher::EventSink;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
