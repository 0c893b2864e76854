//! Session synchronization engine.
//!
//! Owns the in-memory session list and stats snapshot, applies optimistic
//! adds, and reconciles with the remote service through throttled,
//! single-flight refresh cycles. The snapshot is published through a
//! `watch` channel; callers read it, never write it.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::auth::{AuthSession, Credential};
use super::cache::SnapshotCache;
use super::client::SessionApi;
use super::rate_limiter::{RateLimiter, RateLimiterConfig, RefreshOutcome};
use super::retry::{retry_with_backoff, RetryPolicy};
use super::stats::Stats;
use super::types::{LocalRef, NewSession, Session, SessionId, SyncSnapshot};
use crate::clock::{system_clock, NowProvider};
use crate::error::{ApiError, SyncError};

/// Tunables for the refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSettings {
    pub limiter: RateLimiterConfig,
    pub retry: RetryPolicy,
}

pub struct SyncEngine<A: SessionApi> {
    api: Arc<A>,
    auth: AuthSession,
    state: watch::Sender<SyncSnapshot>,
    limiter: Mutex<RateLimiter>,
    cache: Mutex<SnapshotCache>,
    unreconciled: Mutex<Unreconciled>,
    retry: RetryPolicy,
    now: NowProvider,
}

impl<A: SessionApi> std::fmt::Debug for SyncEngine<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("auth", &self.auth)
            .field("snapshot", &*self.state.borrow())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Creates the server accepted that no successful fetch has reflected yet.
/// Fallback data predates them, so they are laid back on top of it.
#[derive(Debug, Default)]
struct Unreconciled {
    sessions: Vec<Session>,
    stats: Vec<(NewSession, DateTime<Utc>)>,
}

/// Per-dataset result of a refresh, after fallback.
enum Applied<T> {
    Fresh(T),
    Fallback(T, ApiError),
    /// 401: leave whatever is shown alone.
    Untouched,
}

impl<A: SessionApi> SyncEngine<A> {
    pub fn new(api: Arc<A>, auth: AuthSession, settings: SyncSettings) -> Self {
        Self::with_clock(api, auth, settings, system_clock())
    }

    pub fn with_clock(api: Arc<A>, auth: AuthSession, settings: SyncSettings, now: NowProvider) -> Self {
        let (state, _) = watch::channel(SyncSnapshot::default());
        Self {
            api,
            auth,
            state,
            limiter: Mutex::new(RateLimiter::with_clock(settings.limiter, Arc::clone(&now))),
            cache: Mutex::new(SnapshotCache::new()),
            unreconciled: Mutex::new(Unreconciled::default()),
            retry: settings.retry,
            now,
        }
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.state.subscribe()
    }

    /// Record a finished session.
    ///
    /// Fails only when nobody is signed in; in that case nothing is touched.
    /// Remote failures are absorbed: the entry stays in the list, flagged
    /// unsaved, and the error slot says so.
    pub async fn add_session(&self, record: NewSession) -> Result<(), SyncError> {
        let Some(credential) = self.auth.credential() else {
            return Err(SyncError::Unauthenticated);
        };

        let local_ref = LocalRef::new();
        let now = (self.now)();
        let pending = Session::pending(local_ref, &record, now);

        self.state.send_modify(|snapshot| {
            if let Some(idx) = snapshot.sessions.iter().position(|s| s.id.is_pending()) {
                let prior = snapshot.sessions.remove(idx);
                if prior.unsaved {
                    warn!(task = %prior.task, "replacing unsaved session with a newer one");
                }
            }
            snapshot.sessions.insert(0, pending);
            snapshot
                .stats
                .get_or_insert_with(Stats::empty)
                .record_local(&record, now);
        });
        debug!(%local_ref, duration = record.duration, "inserted pending session");

        let result = self.api.create_session(&credential.token, &record).await;

        if !self.auth.is_current(credential.epoch) {
            debug!(%local_ref, "discarding create result after sign-out");
            return Ok(());
        }

        match result {
            Ok(saved) => {
                info!(id = ?saved.id, task = %saved.task, "session persisted");
                {
                    let mut unreconciled = lock(&self.unreconciled);
                    unreconciled.sessions.push(saved.clone());
                    unreconciled.stats.push((record, now));
                }
                self.state.send_modify(|snapshot| {
                    if let Some(entry) = find_pending(&mut snapshot.sessions, local_ref) {
                        *entry = saved;
                    }
                });
                self.force_refresh().await;
            }
            Err(ApiError::Unauthorized) => {
                debug!(%local_ref, "create rejected as unauthorized; keeping entry as unsaved");
                self.mark_unsaved(local_ref, None);
            }
            Err(error) => {
                warn!(%local_ref, %error, "failed to persist session");
                self.mark_unsaved(
                    local_ref,
                    Some(format!("Session saved locally but failed to sync: {error}")),
                );
            }
        }
        Ok(())
    }

    /// Reload sessions and stats, subject to the throttle.
    pub async fn refresh_stats(&self) {
        let Some(credential) = self.auth.credential() else {
            self.state.send_replace(SyncSnapshot::default());
            return;
        };

        let ticket = match lock(&self.limiter).try_acquire() {
            Ok(ticket) => ticket,
            Err(gate) => {
                debug!(?gate, "refresh skipped");
                return;
            }
        };
        self.state.send_modify(|snapshot| snapshot.loading = true);

        let (sessions, stats) = self.fetch_both(&credential).await;

        let outcome = match (&sessions, &stats) {
            (Ok(_), Ok(_)) => RefreshOutcome::Success,
            (Err(a), _) if a.is_server_error() => RefreshOutcome::ServerError,
            (_, Err(b)) if b.is_server_error() => RefreshOutcome::ServerError,
            _ => RefreshOutcome::Failed,
        };

        let ticket_current = {
            let mut limiter = lock(&self.limiter);
            let current = limiter.is_current(ticket);
            limiter.finish(ticket, outcome);
            current
        };
        if !ticket_current {
            debug!("discarding superseded refresh");
            return;
        }
        if !self.auth.is_current(credential.epoch) {
            debug!("discarding refresh result after sign-out");
            self.state.send_modify(|snapshot| snapshot.loading = false);
            return;
        }

        let now = (self.now)();
        let (sessions, stats) = {
            let mut cache = lock(&self.cache);
            let mut unreconciled = lock(&self.unreconciled);
            let sessions = match sessions {
                Ok(list) => {
                    cache.store_sessions(&list, now);
                    unreconciled.sessions.clear();
                    Applied::Fresh(list)
                }
                Err(ApiError::Unauthorized) => Applied::Untouched,
                Err(error) => {
                    let mut fallback = cache.sessions().map(|c| c.value.clone()).unwrap_or_default();
                    merge_confirmed(&mut fallback, &unreconciled.sessions);
                    warn!(%error, cached = cache.sessions().is_some(), "sessions fetch failed");
                    Applied::Fallback(fallback, error)
                }
            };
            let stats = match stats {
                Ok(stats) => {
                    cache.store_stats(&stats, now);
                    unreconciled.stats.clear();
                    Applied::Fresh(stats)
                }
                Err(ApiError::Unauthorized) => Applied::Untouched,
                Err(error) => {
                    let mut fallback = cache.stats().map(|c| c.value.clone()).unwrap_or_default();
                    for (record, at) in &unreconciled.stats {
                        fallback.record_local(record, *at);
                    }
                    warn!(%error, cached = cache.stats().is_some(), "stats fetch failed");
                    Applied::Fallback(fallback, error)
                }
            };
            (sessions, stats)
        };

        let saw_unauthorized =
            matches!(sessions, Applied::Untouched) || matches!(stats, Applied::Untouched);
        let error = match (&sessions, &stats) {
            (Applied::Fallback(_, a), Applied::Fallback(_, b)) => Some(format!(
                "Failed to load sessions and stats: sessions: {a}; stats: {b}"
            )),
            (Applied::Fallback(_, a), _) => Some(format!("Failed to load sessions: {a}")),
            (_, Applied::Fallback(_, b)) => Some(format!("Failed to load stats: {b}")),
            _ => None,
        };

        self.state.send_modify(|snapshot| {
            snapshot.loading = false;
            match sessions {
                Applied::Fresh(list) | Applied::Fallback(list, _) => {
                    snapshot.sessions = keep_pending(&snapshot.sessions, list);
                }
                Applied::Untouched => {}
            }
            match stats {
                Applied::Fresh(stats) | Applied::Fallback(stats, _) => snapshot.stats = Some(stats),
                Applied::Untouched => {}
            }
            if error.is_some() || !saw_unauthorized {
                snapshot.error = error;
            }
        });
    }

    /// Drop throttle and in-flight state, then refresh.
    pub async fn force_refresh(&self) {
        lock(&self.limiter).reset();
        self.refresh_stats().await;
    }

    /// Store a credential and load everything from scratch.
    pub async fn sign_in(&self, token: impl Into<String>) {
        self.auth.sign_in(token);
        self.clear_local_state();
        self.force_refresh().await;
    }

    /// Forget the credential and every piece of data loaded under it.
    pub fn sign_out(&self) {
        self.auth.sign_out();
        self.clear_local_state();
        info!("signed out; session data cleared");
    }

    fn clear_local_state(&self) {
        lock(&self.cache).clear();
        *lock(&self.unreconciled) = Unreconciled::default();
        lock(&self.limiter).reset();
        self.state.send_replace(SyncSnapshot::default());
    }

    async fn fetch_both(
        &self,
        credential: &Credential,
    ) -> (Result<Vec<Session>, ApiError>, Result<Stats, ApiError>) {
        let token = credential.token.as_str();
        let api = &self.api;
        tokio::join!(
            retry_with_backoff(self.retry, ApiError::is_retryable, || api.fetch_sessions(token)),
            retry_with_backoff(self.retry, ApiError::is_retryable, || api.fetch_stats(token)),
        )
    }

    fn mark_unsaved(&self, local_ref: LocalRef, error: Option<String>) {
        self.state.send_modify(|snapshot| {
            if let Some(entry) = find_pending(&mut snapshot.sessions, local_ref) {
                entry.unsaved = true;
            }
            if error.is_some() {
                snapshot.error = error;
            }
        });
    }
}

fn find_pending(sessions: &mut [Session], local_ref: LocalRef) -> Option<&mut Session> {
    sessions
        .iter_mut()
        .find(|s| s.id == SessionId::Pending(local_ref))
}

/// Put confirmed creates missing from `list` back at its head, newest first.
fn merge_confirmed(list: &mut Vec<Session>, confirmed: &[Session]) {
    for session in confirmed {
        if !list.iter().any(|s| s.id == session.id) {
            list.insert(0, session.clone());
        }
    }
}

/// Replace the list with `fresh`, carrying a pending entry over at the head.
fn keep_pending(current: &[Session], mut fresh: Vec<Session>) -> Vec<Session> {
    fresh.retain(|s| !s.id.is_pending());
    if let Some(pending) = current.iter().find(|s| s.id.is_pending()) {
        fresh.insert(0, pending.clone());
    }
    fresh
}
