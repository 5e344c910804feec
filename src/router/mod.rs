//! Event routing between the transport and the matchmaker

pub mod handler;

pub use handler::{validate_message, DropReason, EventRouter};
