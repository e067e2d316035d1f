use log::{debug, warn};

use crate::models::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// Same id or same `(started_at, ended_at)` as a stored session.
    Duplicate,
    /// Non-positive duration or an end that does not follow the start.
    Rejected,
}

/// Completed sessions in insertion order.
///
/// Entries are never mutated once stored; `append` is idempotent so the same
/// closure observed twice leaves exactly one record.
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    sessions: Vec<Session>,
    suppressed_duplicates: u64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted records, dropping duplicates and
    /// malformed rows.
    pub fn from_sessions(sessions: Vec<Session>) -> Self {
        let mut store = Self::new();
        for session in sessions {
            store.append(session);
        }
        // Loading is not a duplicate emission.
        store.suppressed_duplicates = 0;
        store
    }

    pub fn append(&mut self, session: Session) -> AppendOutcome {
        if session.ended_at <= session.started_at
            || !session.duration_secs.is_finite()
            || session.duration_secs <= 0.0
        {
            warn!(
                "Rejecting session {} with non-positive duration {:.3}s",
                session.id, session.duration_secs
            );
            return AppendOutcome::Rejected;
        }

        let exists = self
            .sessions
            .iter()
            .any(|stored| stored.id == session.id || stored.same_interval(&session));
        if exists {
            self.suppressed_duplicates += 1;
            debug!(
                "Suppressed duplicate session {} ({} suppressed so far)",
                session.id, self.suppressed_duplicates
            );
            return AppendOutcome::Duplicate;
        }

        self.sessions.push(session);
        AppendOutcome::Inserted
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Snapshot in insertion order.
    pub fn all(&self) -> Vec<Session> {
        self.sessions.clone()
    }

    pub fn recent_first(&self) -> Vec<Session> {
        self.sessions.iter().rev().cloned().collect()
    }

    pub fn sorted_by_duration(&self) -> Vec<Session> {
        let mut sorted = self.sessions.clone();
        sorted.sort_by(|a, b| b.duration_secs.total_cmp(&a.duration_secs));
        sorted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn max_id(&self) -> Option<i64> {
        self.sessions.iter().map(|session| session.id).max()
    }

    pub fn suppressed_duplicates(&self) -> u64 {
        self.suppressed_duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn session(id: i64, start_ms: i64, end_ms: i64) -> Session {
        Session::new(id, at_ms(start_ms), at_ms(end_ms))
    }

    #[test]
    fn appending_the_same_interval_twice_keeps_one_entry() {
        let mut store = SessionStore::new();
        assert_eq!(store.append(session(1, 1000, 2000)), AppendOutcome::Inserted);
        assert_eq!(store.append(session(1, 1000, 2000)), AppendOutcome::Duplicate);
        assert_eq!(store.all().len(), 1);
        assert_eq!(store.suppressed_duplicates(), 1);
    }

    #[test]
    fn same_interval_with_a_new_id_is_still_a_duplicate() {
        let mut store = SessionStore::new();
        store.append(session(1, 1000, 2000));
        assert_eq!(store.append(session(2, 1000, 2000)), AppendOutcome::Duplicate);
        assert_eq!(store.append(session(1, 5000, 9000)), AppendOutcome::Duplicate);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn non_positive_durations_are_rejected() {
        let mut store = SessionStore::new();
        assert_eq!(store.append(session(1, 2000, 2000)), AppendOutcome::Rejected);
        assert_eq!(store.append(session(2, 3000, 2000)), AppendOutcome::Rejected);
        assert!(store.is_empty());
        assert_eq!(store.suppressed_duplicates(), 0);
    }

    #[test]
    fn snapshots_are_detached_from_the_store() {
        let mut store = SessionStore::new();
        store.append(session(1, 1000, 2000));
        let snapshot = store.all();
        store.append(session(2, 3000, 4000));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn display_orders() {
        let mut store = SessionStore::new();
        store.append(session(1, 0, 10_000));
        store.append(session(2, 20_000, 80_000));
        store.append(session(3, 90_000, 95_000));

        let recent: Vec<i64> = store.recent_first().iter().map(|s| s.id).collect();
        assert_eq!(recent, vec![3, 2, 1]);

        let longest: Vec<i64> = store.sorted_by_duration().iter().map(|s| s.id).collect();
        assert_eq!(longest, vec![2, 1, 3]);
        assert_eq!(store.max_id(), Some(3));
    }

    #[test]
    fn loading_drops_duplicates_without_counting_them() {
        let start = at_ms(1_000);
        let loaded = vec![
            Session::new(1, start, start + Duration::seconds(5)),
            Session::new(1, start, start + Duration::seconds(5)),
            Session::new(2, start, start),
        ];
        let store = SessionStore::from_sessions(loaded);
        assert_eq!(store.len(), 1);
        assert_eq!(store.suppressed_duplicates(), 0);
    }

    #[test]
    fn clear_empties_the_store() {
        let mut store = SessionStore::new();
        store.append(session(1, 1000, 2000));
        store.clear();
        assert!(store.all().is_empty());
    }
}
