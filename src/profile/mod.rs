//! Participant profiles
//!
//! Display attributes, interests and moderation state for each open
//! connection.

pub mod store;

pub use store::{Profile, ProfileLimits, ProfileStore, ReportOutcome};
