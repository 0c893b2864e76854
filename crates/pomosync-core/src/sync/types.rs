//! Core types for session synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stats::Stats;

/// Client-side handle for a session the server has not confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalRef(Uuid);

impl LocalRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LocalRef {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LocalRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "local-{}", self.0)
    }
}

/// Identity of a session in the in-memory list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SessionId {
    /// Inserted optimistically; waiting for the server.
    Pending(LocalRef),
    /// Server-assigned identifier.
    Confirmed(i64),
}

impl SessionId {
    pub fn is_pending(&self) -> bool {
        matches!(self, SessionId::Pending(_))
    }
}

/// How a session should be presented while it is being synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSyncStatus {
    Confirmed,
    Saving,
    Unsaved,
}

/// A completed (or abandoned) work session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Duration in minutes.
    pub duration: u32,
    pub task: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Set only on pending entries whose persist call failed.
    #[serde(default)]
    pub unsaved: bool,
}

impl Session {
    /// Build the optimistic entry for a record that is about to be persisted.
    pub fn pending(local_ref: LocalRef, record: &NewSession, created_at: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::Pending(local_ref),
            duration: record.duration,
            task: record.task.clone(),
            completed: record.completed,
            created_at,
            start_time: record.start_time,
            end_time: record.end_time,
            unsaved: false,
        }
    }

    pub fn sync_status(&self) -> SessionSyncStatus {
        match self.id {
            SessionId::Confirmed(_) => SessionSyncStatus::Confirmed,
            SessionId::Pending(_) if self.unsaved => SessionSyncStatus::Unsaved,
            SessionId::Pending(_) => SessionSyncStatus::Saving,
        }
    }
}

/// A session ready to be persisted, as produced by the session recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub duration: u32,
    pub task: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl NewSession {
    pub fn new(duration: u32, task: impl Into<String>, completed: bool) -> Self {
        Self {
            duration,
            task: task.into(),
            completed,
            start_time: None,
            end_time: None,
        }
    }

    pub fn with_times(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }
}

/// Observable state of the sync engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// Most recent first; a pending entry, if any, sits at the head.
    pub sessions: Vec<Session>,
    /// `None` until something is loaded (or after sign-out).
    pub stats: Option<Stats>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SyncSnapshot {
    pub fn pending(&self) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id.is_pending())
    }
}
