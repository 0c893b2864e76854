use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{TimerPhase, TimerState};

/// Every timer state change produces an Event.
/// The CLI prints them; the session recorder consumes completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: TimerPhase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// The countdown reached zero. Emitted before the phase switch.
    PhaseCompleted(PhaseCompletion),
    PhaseChanged {
        from: TimerPhase,
        to: TimerPhase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerSkipped {
        from: TimerPhase,
        to: TimerPhase,
        at: DateTime<Utc>,
    },
    TimerReset {
        phase: TimerPhase,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        phase: TimerPhase,
        remaining_secs: u64,
        total_secs: u64,
        completed_pomodoros: u32,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
}

/// Everything the session recorder needs about a finished phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCompletion {
    pub phase: TimerPhase,
    /// Counter value after this completion was counted.
    pub completed_pomodoros: u32,
    /// Wall-clock anchor taken when the phase first started running.
    pub started_at: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
    pub configured_minutes: u32,
}
