//! Last-known-good copies of server data, used only when a refresh fails.

use chrono::{DateTime, Utc};

use super::stats::Stats;
use super::types::Session;

#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SnapshotCache {
    sessions: Option<Cached<Vec<Session>>>,
    stats: Option<Cached<Stats>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a server-confirmed session list. Pending entries are never cached.
    pub fn store_sessions(&mut self, sessions: &[Session], at: DateTime<Utc>) {
        let confirmed = sessions
            .iter()
            .filter(|s| !s.id.is_pending())
            .cloned()
            .collect();
        self.sessions = Some(Cached {
            value: confirmed,
            captured_at: at,
        });
    }

    pub fn store_stats(&mut self, stats: &Stats, at: DateTime<Utc>) {
        self.stats = Some(Cached {
            value: stats.clone(),
            captured_at: at,
        });
    }

    pub fn sessions(&self) -> Option<&Cached<Vec<Session>>> {
        self.sessions.as_ref()
    }

    pub fn stats(&self) -> Option<&Cached<Stats>> {
        self.stats.as_ref()
    }

    pub fn clear(&mut self) {
        self.sessions = None;
        self.stats = None;
    }
}
