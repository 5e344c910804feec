//! Waiting queue of connections seeking a partner
//!
//! The queue keeps FIFO order by enqueue time and never holds the same
//! connection twice; every insert removes any older entry first.

use crate::queue::matching::{MatchCandidates, MatchPolicy};
use crate::types::ConnectionId;
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::debug;

/// Queue entry that preserves enqueue order
#[derive(Debug, Clone, PartialEq)]
pub struct WaitingEntry {
    pub connection_id: ConnectionId,
    pub enqueued_at: DateTime<Utc>,
}

/// Ordered collection of waiting connections
#[derive(Debug, Default)]
pub struct WaitingQueue {
    entries: VecDeque<WaitingEntry>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail, removing any existing entry first.
    ///
    /// Returns true if an older entry was replaced.
    pub fn enqueue(&mut self, connection_id: &str) -> bool {
        let replaced = self.remove(connection_id).is_some();
        self.entries.push_back(WaitingEntry {
            connection_id: connection_id.to_string(),
            enqueued_at: current_timestamp(),
        });
        replaced
    }

    /// Remove the entry for a connection if present
    pub fn remove(&mut self, connection_id: &str) -> Option<WaitingEntry> {
        let index = self.position(connection_id)?;
        self.entries.remove(index)
    }

    /// Take the head of the queue
    pub fn pop_front(&mut self) -> Option<WaitingEntry> {
        self.entries.pop_front()
    }

    /// Return an entry to the head, keeping its original enqueue time
    pub fn push_front(&mut self, entry: WaitingEntry) {
        self.remove(&entry.connection_id);
        self.entries.push_front(entry);
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.position(connection_id).is_some()
    }

    pub fn position(&self, connection_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.connection_id == connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WaitingEntry> {
        self.entries.iter()
    }

    /// Connection ids in queue order
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.entries
            .iter()
            .map(|entry| entry.connection_id.clone())
            .collect()
    }

    /// Drop entries that went stale while waiting (closed or cooled down).
    ///
    /// Returns the number of entries removed.
    pub fn sweep<F>(&mut self, is_eligible: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let before = self.entries.len();
        self.entries
            .retain(|entry| is_eligible(&entry.connection_id));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Swept {} stale entries from waiting queue", removed);
        }
        removed
    }

    /// Find the best partner in the queue for `seeker`.
    ///
    /// Skips the seeker itself and any ineligible or incompatible entry. The
    /// highest policy score wins; ties go to the earliest entry. The scan stops
    /// at the first candidate reaching the policy's good-enough score.
    pub fn find_best_match_for(
        &self,
        seeker: &str,
        policy: &dyn MatchPolicy,
        candidates: &dyn MatchCandidates,
    ) -> Option<ConnectionId> {
        let seeker_interests = candidates.interests(seeker);
        let good_enough = policy.good_enough_score();
        let mut best: Option<(&WaitingEntry, usize)> = None;

        for entry in &self.entries {
            let candidate = entry.connection_id.as_str();
            if candidate == seeker
                || !candidates.is_eligible(candidate)
                || !candidates.are_compatible(seeker, candidate)
            {
                continue;
            }

            let score = policy.score(seeker_interests, candidates.interests(candidate));
            let better = best.map(|(_, best_score)| score > best_score).unwrap_or(true);
            if better {
                best = Some((entry, score));
                if score >= good_enough {
                    break;
                }
            }
        }

        best.map(|(entry, _)| entry.connection_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::matching::{FifoMatchPolicy, InterestMatchPolicy};
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct TestCandidates {
        interests: HashMap<String, Vec<String>>,
        ineligible: HashSet<String>,
        blocked_pairs: HashSet<(String, String)>,
    }

    impl TestCandidates {
        fn with_interests(mut self, id: &str, tags: &[&str]) -> Self {
            self.interests
                .insert(id.to_string(), tags.iter().map(|t| t.to_string()).collect());
            self
        }

        fn ineligible(mut self, id: &str) -> Self {
            self.ineligible.insert(id.to_string());
            self
        }

        fn blocked(mut self, a: &str, b: &str) -> Self {
            self.blocked_pairs.insert((a.to_string(), b.to_string()));
            self
        }
    }

    impl MatchCandidates for TestCandidates {
        fn is_eligible(&self, connection_id: &str) -> bool {
            !self.ineligible.contains(connection_id)
        }

        fn are_compatible(&self, a: &str, b: &str) -> bool {
            a != b
                && !self.blocked_pairs.contains(&(a.to_string(), b.to_string()))
                && !self.blocked_pairs.contains(&(b.to_string(), a.to_string()))
        }

        fn interests(&self, connection_id: &str) -> &[String] {
            self.interests
                .get(connection_id)
                .map(|tags| tags.as_slice())
                .unwrap_or(&[])
        }
    }

    fn queue_of(ids: &[&str]) -> WaitingQueue {
        let mut queue = WaitingQueue::new();
        for id in ids {
            queue.enqueue(id);
        }
        queue
    }

    #[test]
    fn test_enqueue_twice_keeps_one_entry() {
        let mut queue = WaitingQueue::new();
        assert!(!queue.enqueue("a"));
        assert!(queue.enqueue("a"));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.ids(), vec!["a"]);
    }

    #[test]
    fn test_reenqueue_moves_to_tail() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.enqueue("a");
        assert_eq!(queue.ids(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_push_front_restores_head() {
        let mut queue = queue_of(&["a", "b"]);
        let head = queue.pop_front().unwrap();
        assert_eq!(head.connection_id, "a");
        queue.push_front(head.clone());
        assert_eq!(queue.ids(), vec!["a", "b"]);
        assert_eq!(queue.iter().next().unwrap().enqueued_at, head.enqueued_at);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut queue = queue_of(&["a"]);
        assert!(queue.remove("zzz").is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_sweep_drops_ineligible_entries() {
        let mut queue = queue_of(&["a", "b", "c"]);
        let removed = queue.sweep(|id| id != "b");
        assert_eq!(removed, 1);
        assert_eq!(queue.ids(), vec!["a", "c"]);
    }

    #[test]
    fn test_fifo_picks_earliest_candidate() {
        let queue = queue_of(&["b", "c"]);
        let candidates = TestCandidates::default()
            .with_interests("a", &["music"])
            .with_interests("c", &["music"]);

        let best = queue.find_best_match_for("a", &FifoMatchPolicy, &candidates);
        assert_eq!(best.as_deref(), Some("b"));
    }

    #[test]
    fn test_interest_policy_prefers_shared_tags() {
        let queue = queue_of(&["b", "c", "d"]);
        let candidates = TestCandidates::default()
            .with_interests("a", &["music", "art"])
            .with_interests("b", &["sports"])
            .with_interests("c", &["art"])
            .with_interests("d", &["art", "music"]);

        let best = queue.find_best_match_for("a", &InterestMatchPolicy::default(), &candidates);
        assert_eq!(best.as_deref(), Some("d"));
    }

    #[test]
    fn test_interest_ties_break_by_queue_order() {
        let queue = queue_of(&["b", "c"]);
        let candidates = TestCandidates::default()
            .with_interests("a", &["art"])
            .with_interests("b", &["art"])
            .with_interests("c", &["art"]);

        let best = queue.find_best_match_for("a", &InterestMatchPolicy::default(), &candidates);
        assert_eq!(best.as_deref(), Some("b"));
    }

    #[test]
    fn test_scan_stops_at_good_enough_score() {
        let queue = queue_of(&["b", "c"]);
        let candidates = TestCandidates::default()
            .with_interests("a", &["x", "y", "z"])
            .with_interests("b", &["x", "y"])
            .with_interests("c", &["x", "y", "z"]);

        // b already reaches the good-enough score of 2, so c is never considered
        let best = queue.find_best_match_for("a", &InterestMatchPolicy::default(), &candidates);
        assert_eq!(best.as_deref(), Some("b"));
    }

    #[test]
    fn test_exclusions() {
        let queue = queue_of(&["a", "b", "c"]);
        let candidates = TestCandidates::default().ineligible("b").blocked("c", "a");

        let best = queue.find_best_match_for("a", &FifoMatchPolicy, &candidates);
        assert_eq!(best, None);
    }

    #[test]
    fn test_empty_queue_has_no_match() {
        let queue = WaitingQueue::new();
        let candidates = TestCandidates::default();
        assert_eq!(
            queue.find_best_match_for("a", &FifoMatchPolicy, &candidates),
            None
        );
    }
}
