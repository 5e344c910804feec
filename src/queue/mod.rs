//! Waiting queue and pairing policies
//!
//! This module holds the ordered queue of connections looking for a partner
//! and the scoring policies used to pick the best partner for a connection.

pub mod matching;
pub mod waiting;

// Re-export commonly used types
pub use matching::{
    policy_for, FifoMatchPolicy, InterestMatchPolicy, MatchCandidates, MatchPolicy,
};
pub use waiting::{WaitingEntry, WaitingQueue};
