//! # Pomosync Core Library
//!
//! This library provides the core logic for the pomosync Pomodoro timer and
//! its session synchronization. It follows a CLI-first philosophy: every
//! operation is available through the standalone `pomosync` binary, which is
//! a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A countdown state machine that requires the caller
//!   to invoke `tick()` once per second
//! - **Session Recorder**: Turns completed work phases into session records
//! - **Sync Engine**: Optimistic adds and throttled, single-flight refresh
//!   against a remote persistence service, with per-dataset cache fallback
//! - **Storage**: TOML-based configuration and a small recent-task cache
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerRunner`]: Timer plus recorder, one tick at a time
//! - [`SyncEngine`]: Session list and stats snapshot, kept in sync
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod storage;
pub mod sync;
pub mod timer;

pub use clock::{system_clock, ManualClock, NowProvider};
pub use error::{ApiError, CacheError, ConfigError, CoreError, SyncError};
pub use events::{Event, PhaseCompletion};
pub use storage::{Config, RecentTasks, SyncConfig};
pub use sync::{
    AuthSession, NewSession, ReqwestSessionApi, Session, SessionApi, SessionId, Stats,
    SyncEngine, SyncSettings, SyncSnapshot,
};
pub use timer::{
    SessionRecorder, TaskContext, TickOutcome, TimerConfig, TimerEngine, TimerPhase, TimerProgress,
    TimerRunner, TimerState, TodoItem,
};
