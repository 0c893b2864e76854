//! Session synchronization layer.
//!
//! Optimistic local adds, throttled single-flight refresh, retry with
//! backoff, per-dataset fallback to the last good snapshot.

pub mod auth;
pub mod cache;
pub mod client;
pub mod engine;
pub mod normalize;
pub mod rate_limiter;
pub mod retry;
pub mod stats;
pub mod types;


pub use auth::{AuthSession, Credential};
pub use cache::{Cached, SnapshotCache};
pub use client::{ReqwestSessionApi, SessionApi};
pub use engine::{SyncEngine, SyncSettings};
pub use normalize::normalize_stats;
pub use rate_limiter::{Gate, RateLimiter, RateLimiterConfig, RefreshOutcome, RefreshTicket};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use stats::{HeatmapDay, Stats, WeekdayActivity, WeeklyTrend};
pub use types::{LocalRef, NewSession, Session, SessionId, SessionSyncStatus, SyncSnapshot};
