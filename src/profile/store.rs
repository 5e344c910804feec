//! Ephemeral per-connection profiles and moderation state
//!
//! Profiles hold the display attributes shown to a partner plus the
//! moderation state (reports, cooldown, blocks) that matching consults.
//! Everything is dropped when the connection closes.

use crate::config::MatchmakingSettings;
use crate::types::{ConnectionId, PublicProfile};
use crate::utils::{current_timestamp, normalize_interests, truncate_chars, DEFAULT_DISPLAY_NAME};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Profile of a single connection
#[derive(Debug, Clone)]
pub struct Profile {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub gender: String,
    pub interests: Vec<String>,
    pub report_count: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub blocked_peers: HashSet<ConnectionId>,
    /// Partner of the most recently ended session; not re-matched immediately
    pub recent_peer: Option<ConnectionId>,
}

impl Profile {
    fn new(connection_id: &str) -> Self {
        Self {
            connection_id: connection_id.to_string(),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            gender: String::new(),
            interests: Vec::new(),
            report_count: 0,
            cooldown_until: None,
            blocked_peers: HashSet::new(),
            recent_peer: None,
        }
    }

    /// Attributes a partner is allowed to see
    pub fn public(&self) -> PublicProfile {
        PublicProfile {
            name: self.display_name.clone(),
            gender: self.gender.clone(),
        }
    }

    pub fn is_in_cooldown_at(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map(|until| until > now).unwrap_or(false)
    }

    pub fn has_blocked(&self, peer: &str) -> bool {
        self.blocked_peers.contains(peer)
    }
}

/// Result of recording a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOutcome {
    /// Reports recorded against the target so far
    pub count: u32,
    /// Whether this report put the target into cooldown
    pub cooldown_applied: bool,
}

/// Limits applied when normalizing profile input
#[derive(Debug, Clone)]
pub struct ProfileLimits {
    pub max_name_chars: usize,
    pub max_gender_chars: usize,
    pub max_interests: usize,
}

impl Default for ProfileLimits {
    fn default() -> Self {
        Self {
            max_name_chars: 40,
            max_gender_chars: 20,
            max_interests: 5,
        }
    }
}

/// Store of all live profiles
#[derive(Debug)]
pub struct ProfileStore {
    profiles: HashMap<ConnectionId, Profile>,
    limits: ProfileLimits,
    report_threshold: u32,
    cooldown: Duration,
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new(ProfileLimits::default(), 3, Duration::minutes(10))
    }
}

impl ProfileStore {
    pub fn new(limits: ProfileLimits, report_threshold: u32, cooldown: Duration) -> Self {
        Self {
            profiles: HashMap::new(),
            limits,
            report_threshold,
            cooldown,
        }
    }

    /// Build a store from matchmaking settings
    pub fn from_settings(settings: &MatchmakingSettings) -> Self {
        Self::new(
            ProfileLimits {
                max_name_chars: settings.max_name_chars,
                max_gender_chars: settings.max_gender_chars,
                max_interests: settings.max_interests,
            },
            settings.report_threshold,
            Duration::seconds(settings.cooldown_seconds as i64),
        )
    }

    fn entry(&mut self, connection_id: &str) -> &mut Profile {
        self.profiles
            .entry(connection_id.to_string())
            .or_insert_with(|| Profile::new(connection_id))
    }

    /// Set display attributes, normalizing and truncating the input.
    ///
    /// Moderation state of an existing profile is kept.
    pub fn set_profile<S: AsRef<str>>(
        &mut self,
        connection_id: &str,
        name: Option<&str>,
        gender: Option<&str>,
        interests: &[S],
    ) -> &Profile {
        let name = name
            .map(|n| truncate_chars(n.trim(), self.limits.max_name_chars))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());
        let gender = gender
            .map(|g| truncate_chars(g.trim(), self.limits.max_gender_chars))
            .unwrap_or_default();
        let interests = normalize_interests(interests, self.limits.max_interests);

        let profile = self.entry(connection_id);
        profile.display_name = name;
        profile.gender = gender;
        profile.interests = interests;

        debug!(
            "Profile set for {} - name: '{}', gender: '{}', interests: {:?}",
            connection_id, profile.display_name, profile.gender, profile.interests
        );
        profile
    }

    pub fn get_profile(&self, connection_id: &str) -> Option<&Profile> {
        self.profiles.get(connection_id)
    }

    /// Public attributes, falling back to defaults for unknown connections
    pub fn public_profile(&self, connection_id: &str) -> PublicProfile {
        self.profiles
            .get(connection_id)
            .map(Profile::public)
            .unwrap_or_default()
    }

    /// Interest tags of a connection (empty when unknown)
    pub fn interests_of(&self, connection_id: &str) -> &[String] {
        self.profiles
            .get(connection_id)
            .map(|p| p.interests.as_slice())
            .unwrap_or(&[])
    }

    /// Count a report against `target`, applying a cooldown at the threshold
    pub fn record_report(&mut self, target: &str) -> ReportOutcome {
        self.record_report_at(target, current_timestamp())
    }

    pub fn record_report_at(&mut self, target: &str, now: DateTime<Utc>) -> ReportOutcome {
        let threshold = self.report_threshold;
        let cooldown = self.cooldown;
        let profile = self.entry(target);

        profile.report_count += 1;
        let cooldown_applied = profile.report_count >= threshold;
        if cooldown_applied {
            let until = now + cooldown;
            profile.cooldown_until = Some(until);
            info!(
                "Connection {} reached {} reports, cooldown until {}",
                target, profile.report_count, until
            );
        }

        ReportOutcome {
            count: profile.report_count,
            cooldown_applied,
        }
    }

    /// Add `peer` to the block set of `owner`. Returns false for self-blocks.
    pub fn block(&mut self, owner: &str, peer: &str) -> bool {
        if owner == peer {
            return false;
        }
        self.entry(owner).blocked_peers.insert(peer.to_string());
        true
    }

    /// A block in either direction keeps the pair apart
    pub fn is_blocked_either_way(&self, a: &str, b: &str) -> bool {
        let a_blocks = self.profiles.get(a).map(|p| p.has_blocked(b));
        let b_blocks = self.profiles.get(b).map(|p| p.has_blocked(a));
        a_blocks.unwrap_or(false) || b_blocks.unwrap_or(false)
    }

    /// Remember the last partner of both sides of an ended session
    pub fn set_recent_peers(&mut self, a: &str, b: &str) {
        self.entry(a).recent_peer = Some(b.to_string());
        self.entry(b).recent_peer = Some(a.to_string());
    }

    /// Drop the recent-peer mark between `connection_id` and its last
    /// partner, on both sides
    pub fn clear_recent_peer(&mut self, connection_id: &str) {
        let Some(peer) = self
            .profiles
            .get_mut(connection_id)
            .and_then(|p| p.recent_peer.take())
        else {
            return;
        };
        if let Some(profile) = self.profiles.get_mut(&peer) {
            if profile.recent_peer.as_deref() == Some(connection_id) {
                profile.recent_peer = None;
            }
        }
    }

    /// Whether either side just left a session with the other
    pub fn is_recent_peer(&self, a: &str, b: &str) -> bool {
        let a_recent = self
            .profiles
            .get(a)
            .and_then(|p| p.recent_peer.as_deref())
            .map(|peer| peer == b);
        let b_recent = self
            .profiles
            .get(b)
            .and_then(|p| p.recent_peer.as_deref())
            .map(|peer| peer == a);
        a_recent.unwrap_or(false) || b_recent.unwrap_or(false)
    }

    pub fn is_in_cooldown(&self, connection_id: &str) -> bool {
        self.is_in_cooldown_at(connection_id, current_timestamp())
    }

    pub fn is_in_cooldown_at(&self, connection_id: &str, now: DateTime<Utc>) -> bool {
        self.profiles
            .get(connection_id)
            .map(|p| p.is_in_cooldown_at(now))
            .unwrap_or(false)
    }

    /// Drop the profile of a closed connection
    pub fn remove(&mut self, connection_id: &str) -> Option<Profile> {
        self.profiles.remove(connection_id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
