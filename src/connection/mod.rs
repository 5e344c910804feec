//! Connection tracking for the relay service
//!
//! This module tracks which transport connections are currently open and
//! reachable, and feeds the online presence count.

pub mod registry;

pub use registry::ConnectionRegistry;
