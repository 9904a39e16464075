//! Sync session cache.
//!
//! One session lives for the duration of one sync chain and is passed by
//! reference through every reconciliation call, so the group/user/course
//! collections fetched by one phase can be reused by the next without a
//! second remote walk. Exactly one chain is expected per process: creating
//! a session while an unexpired one exists logs the old session's stats at
//! `warn` before discarding it.
//!
//! Entries expire 60 minutes (configurable) after creation or the last
//! refresh; expired data is treated as absent and dropped on next access,
//! so stale collections are never silently served.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use alliance_lms::{LmsCourseRecord, LmsGroupRecord, LmsUserRecord};

/// Cache efficiency counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Lookups answered from the cache.
    pub hits: u32,
    /// Lookups that found nothing (or found expired data).
    pub misses: u32,
}

/// Short-lived cache shared across the reconciliation calls of one chain.
#[derive(Debug)]
pub struct SyncSession {
    id: String,
    ttl: Duration,
    expires_at: Instant,
    groups: Option<Vec<LmsGroupRecord>>,
    users: Option<Vec<LmsUserRecord>>,
    courses: Option<Vec<LmsCourseRecord>>,
    partner_groups: HashMap<Uuid, String>,
    stats: SessionStats,
}

impl SyncSession {
    /// Creates a fresh session.
    #[must_use]
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        Self {
            id: id.into(),
            ttl,
            expires_at: Instant::now() + ttl,
            groups: None,
            users: None,
            courses: None,
            partner_groups: HashMap::new(),
            stats: SessionStats::default(),
        }
    }

    /// Creates a session, logging the previous one's efficiency stats when
    /// it is being replaced before expiry.
    #[must_use]
    pub fn replacing(previous: Option<&SyncSession>, id: impl Into<String>, ttl: Duration) -> Self {
        if let Some(prev) = previous {
            if !prev.is_expired() {
                warn!(
                    session_id = %prev.id,
                    hits = prev.stats.hits,
                    misses = prev.stats.misses,
                    "Replacing unexpired sync session"
                );
            }
        }
        Self::new(id, ttl)
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the TTL has elapsed since creation or the last refresh.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Pushes expiry out by the full TTL.
    fn refresh(&mut self) {
        self.expires_at = Instant::now() + self.ttl;
    }

    /// Drops all cached data once expired; called lazily on access.
    fn purge_if_expired(&mut self) {
        if self.is_expired() {
            self.groups = None;
            self.users = None;
            self.courses = None;
            self.partner_groups.clear();
        }
    }

    /// Cached groups, if present and unexpired.
    pub fn groups(&mut self) -> Option<&[LmsGroupRecord]> {
        self.purge_if_expired();
        match &self.groups {
            Some(groups) => {
                self.stats.hits += 1;
                Some(groups.as_slice())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Stores the group collection and refreshes expiry.
    pub fn set_groups(&mut self, groups: Vec<LmsGroupRecord>) {
        self.refresh();
        self.groups = Some(groups);
    }

    /// Cached users, if present and unexpired.
    pub fn users(&mut self) -> Option<&[LmsUserRecord]> {
        self.purge_if_expired();
        match &self.users {
            Some(users) => {
                self.stats.hits += 1;
                Some(users.as_slice())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Stores the user collection and refreshes expiry.
    pub fn set_users(&mut self, users: Vec<LmsUserRecord>) {
        self.refresh();
        self.users = Some(users);
    }

    /// Cached courses, if present and unexpired.
    pub fn courses(&mut self) -> Option<&[LmsCourseRecord]> {
        self.purge_if_expired();
        match &self.courses {
            Some(courses) => {
                self.stats.hits += 1;
                Some(courses.as_slice())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Stores the course collection and refreshes expiry.
    pub fn set_courses(&mut self, courses: Vec<LmsCourseRecord>) {
        self.refresh();
        self.courses = Some(courses);
    }

    /// Records a partner's dedicated LMS group.
    pub fn set_partner_group(&mut self, partner_id: Uuid, group_id: String) {
        self.partner_groups.insert(partner_id, group_id);
    }

    /// The precomputed partner → group mapping.
    pub fn partner_group_id(&mut self, partner_id: Uuid) -> Option<String> {
        self.purge_if_expired();
        match self.partner_groups.get(&partner_id) {
            Some(group_id) => {
                self.stats.hits += 1;
                Some(group_id.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Efficiency counters so far.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, name: &str) -> LmsGroupRecord {
        LmsGroupRecord {
            lms_id: id.to_string(),
            name: name.to_string(),
            member_count: Some(3),
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let mut session = SyncSession::new("s-1", Duration::from_secs(3600));
        assert!(session.groups().is_none());

        session.set_groups(vec![group("g-1", "Acme")]);
        assert_eq!(session.groups().unwrap().len(), 1);

        let stats = session.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_expired_data_treated_as_absent() {
        let mut session = SyncSession::new("s-2", Duration::from_millis(5));
        session.set_groups(vec![group("g-1", "Acme")]);
        session.set_partner_group(Uuid::new_v4(), "g-1".to_string());

        std::thread::sleep(Duration::from_millis(10));

        assert!(session.is_expired());
        assert!(session.groups().is_none());
        assert_eq!(session.stats().hits, 0);
    }

    #[test]
    fn test_set_refreshes_expiry() {
        let mut session = SyncSession::new("s-3", Duration::from_millis(50));
        std::thread::sleep(Duration::from_millis(30));
        session.set_users(Vec::new());
        std::thread::sleep(Duration::from_millis(30));

        // 60ms after creation but only 30ms after the refresh.
        assert!(session.users().is_some());
    }

    #[test]
    fn test_partner_group_lookup() {
        let mut session = SyncSession::new("s-4", Duration::from_secs(3600));
        let partner_id = Uuid::new_v4();
        session.set_partner_group(partner_id, "g-77".to_string());

        assert_eq!(session.partner_group_id(partner_id).as_deref(), Some("g-77"));
        assert!(session.partner_group_id(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_replacing_unexpired_session() {
        let old = SyncSession::new("s-5", Duration::from_secs(3600));
        let new = SyncSession::replacing(Some(&old), "s-6", Duration::from_secs(3600));
        assert_eq!(new.id(), "s-6");
        assert_eq!(new.stats(), SessionStats::default());
    }
}
