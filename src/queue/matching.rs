//! Match scoring policies for the waiting queue
//!
//! This module holds the single policy hook used by the best-match search.
//! FIFO pairing and interest-weighted pairing both implement it so either can
//! be selected by configuration and tested on its own.

use crate::config::MatchPolicyKind;
use crate::utils::shared_interest_count;
use std::sync::Arc;

/// View of connection state the best-match search needs
pub trait MatchCandidates {
    /// Connection is live and not in cooldown
    fn is_eligible(&self, connection_id: &str) -> bool;

    /// The two connections may be paired (distinct, not blocked, not just parted)
    fn are_compatible(&self, a: &str, b: &str) -> bool;

    /// Interest tags of a connection
    fn interests(&self, connection_id: &str) -> &[String];
}

/// Trait for pairing score policies
pub trait MatchPolicy: Send + Sync {
    /// Policy name for logs
    fn name(&self) -> &'static str;

    /// Score how well a candidate fits the seeker (higher = better fit)
    fn score(&self, seeker_interests: &[String], candidate_interests: &[String]) -> usize;

    /// Score at which the scan may stop looking for a better candidate
    fn good_enough_score(&self) -> usize;
}

/// First-come first-served pairing; every candidate scores 0
#[derive(Debug, Default, Clone)]
pub struct FifoMatchPolicy;

impl MatchPolicy for FifoMatchPolicy {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn score(&self, _seeker_interests: &[String], _candidate_interests: &[String]) -> usize {
        0
    }

    fn good_enough_score(&self) -> usize {
        0
    }
}

/// Interest-weighted pairing
///
/// Candidates are scored by the number of shared interest tags. The scan
/// stops at the first candidate reaching `good_match_score`, trading an
/// exhaustive search for a fast answer on large queues.
#[derive(Debug, Clone)]
pub struct InterestMatchPolicy {
    good_match_score: usize,
}

impl InterestMatchPolicy {
    pub fn new(good_match_score: usize) -> Self {
        Self { good_match_score }
    }
}

impl Default for InterestMatchPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

impl MatchPolicy for InterestMatchPolicy {
    fn name(&self) -> &'static str {
        "interest"
    }

    fn score(&self, seeker_interests: &[String], candidate_interests: &[String]) -> usize {
        shared_interest_count(seeker_interests, candidate_interests)
    }

    fn good_enough_score(&self) -> usize {
        self.good_match_score
    }
}

/// Build the configured policy
pub fn policy_for(kind: MatchPolicyKind, good_match_score: usize) -> Arc<dyn MatchPolicy> {
    match kind {
        MatchPolicyKind::Fifo => Arc::new(FifoMatchPolicy),
        MatchPolicyKind::Interest => Arc::new(InterestMatchPolicy::new(good_match_score)),
    }
}
