//! Timer engine implementation.
//!
//! The timer engine is a phase/run-state machine. It does not use internal
//! threads - the caller is responsible for calling `tick()` once per second.
//! The countdown moves one second per tick; the wall-clock anchor taken on
//! start is what session durations are computed from, so tick drift never
//! leaks into recorded minutes.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused -> Running)* -> Completed -> (Idle | Running)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(TimerConfig::default());
//! engine.start();
//! // Once per second:
//! if let Some(Event::PhaseCompleted(done)) = engine.tick() {
//!     // record, then switch phase
//!     engine.advance();
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::{TimerConfig, TimerPhase};
use crate::clock::{system_clock, NowProvider};
use crate::events::{Event, PhaseCompletion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    /// Countdown hit zero; the phase switch has not happened yet.
    Completed,
}

/// Where the engine stands in the work/break cycle, carried across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerProgress {
    pub phase: TimerPhase,
    #[serde(default)]
    pub completed_pomodoros: u32,
}

impl Default for TimerProgress {
    fn default() -> Self {
        Self {
            phase: TimerPhase::Work,
            completed_pomodoros: 0,
        }
    }
}

/// Core timer engine.
pub struct TimerEngine {
    config: TimerConfig,
    phase: TimerPhase,
    state: TimerState,
    remaining_secs: u64,
    completed_pomodoros: u32,
    started_at: Option<DateTime<Utc>>,
    now: NowProvider,
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("phase", &self.phase)
            .field("state", &self.state)
            .field("remaining_secs", &self.remaining_secs)
            .field("completed_pomodoros", &self.completed_pomodoros)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    /// Create a new timer engine. Starts `Idle` in the WORK phase.
    pub fn new(config: TimerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: TimerConfig, now: NowProvider) -> Self {
        let remaining_secs = config.duration_secs(TimerPhase::Work);
        Self {
            config,
            phase: TimerPhase::Work,
            state: TimerState::Idle,
            remaining_secs,
            completed_pomodoros: 0,
            started_at: None,
            now,
        }
    }

    /// Continue the cycle from `progress`, idle at the top of that phase.
    pub fn with_progress(mut self, progress: TimerProgress) -> Self {
        self.completed_pomodoros = progress.completed_pomodoros;
        self.enter_phase(progress.phase);
        self.state = TimerState::Idle;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn progress(&self) -> TimerProgress {
        TimerProgress {
            phase: self.phase,
            completed_pomodoros: self.completed_pomodoros,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn completed_pomodoros(&self) -> u32 {
        self.completed_pomodoros
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn total_secs(&self) -> u64 {
        self.config.duration_secs(self.phase)
    }

    /// 0.0 .. 100.0 progress within the current phase.
    pub fn progress_pct(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return 0.0;
        }
        let done = total.saturating_sub(self.remaining_secs) as f64;
        (done / total as f64 * 100.0).min(100.0)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            total_secs: self.total_secs(),
            completed_pomodoros: self.completed_pomodoros,
            progress_pct: self.progress_pct(),
            at: (self.now)(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        let at = (self.now)();
        match self.state {
            TimerState::Idle => {
                self.state = TimerState::Running;
                // A fresh run of the phase anchors the wall clock.
                self.started_at.get_or_insert(at);
                Some(Event::TimerStarted {
                    phase: self.phase,
                    duration_secs: self.remaining_secs,
                    at,
                })
            }
            TimerState::Paused => {
                self.state = TimerState::Running;
                self.started_at.get_or_insert(at);
                Some(Event::TimerResumed {
                    remaining_secs: self.remaining_secs,
                    at,
                })
            }
            TimerState::Running | TimerState::Completed => None,
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Running => {
                self.state = TimerState::Paused;
                Some(Event::TimerPaused {
                    remaining_secs: self.remaining_secs,
                    at: (self.now)(),
                })
            }
            _ => None,
        }
    }

    pub fn resume(&mut self) -> Option<Event> {
        self.start()
    }

    pub fn reset(&mut self) -> Option<Event> {
        self.state = TimerState::Idle;
        self.started_at = None;
        self.remaining_secs = self.config.duration_secs(self.phase);
        Some(Event::TimerReset {
            phase: self.phase,
            at: (self.now)(),
        })
    }

    /// Switch phase immediately. Never counts as a completion.
    pub fn skip(&mut self) -> Option<Event> {
        let from = self.phase;
        let to = match from {
            TimerPhase::Work => self.config.break_after(self.completed_pomodoros + 1),
            TimerPhase::ShortBreak | TimerPhase::LongBreak => TimerPhase::Work,
        };
        self.enter_phase(to);
        self.state = TimerState::Idle;
        Some(Event::TimerSkipped {
            from,
            to,
            at: (self.now)(),
        })
    }

    /// Call once per second. Returns `Some(Event::PhaseCompleted)` when the
    /// countdown reaches zero; the engine then stays `Completed` until
    /// [`advance`](Self::advance) is called.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return None;
        }

        self.state = TimerState::Completed;
        if self.phase == TimerPhase::Work {
            self.completed_pomodoros += 1;
        }
        Some(Event::PhaseCompleted(PhaseCompletion {
            phase: self.phase,
            completed_pomodoros: self.completed_pomodoros,
            started_at: self.started_at,
            at: (self.now)(),
            configured_minutes: self.config.duration_minutes(self.phase),
        }))
    }

    /// Perform the phase switch that follows a completion.
    pub fn advance(&mut self) -> Option<Event> {
        if self.state != TimerState::Completed {
            return None;
        }
        let from = self.phase;
        let to = match from {
            TimerPhase::Work => self.config.break_after(self.completed_pomodoros),
            TimerPhase::ShortBreak | TimerPhase::LongBreak => TimerPhase::Work,
        };
        self.enter_phase(to);

        let at = (self.now)();
        if self.config.auto_advance {
            self.state = TimerState::Running;
            self.started_at = Some(at);
        } else {
            self.state = TimerState::Idle;
        }
        Some(Event::PhaseChanged {
            from,
            to,
            duration_secs: self.remaining_secs,
            at,
        })
    }

    pub fn set_config(&mut self, config: TimerConfig) {
        self.config = config;
        self.reset();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn enter_phase(&mut self, phase: TimerPhase) {
        self.phase = phase;
        self.started_at = None;
        self.remaining_secs = self.config.duration_secs(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;

    fn short_config() -> TimerConfig {
        TimerConfig {
            work_minutes: 1,
            short_break_minutes: 1,
            long_break_minutes: 2,
            pomodoros_until_long_break: 2,
            auto_advance: false,
        }
    }

    fn engine_at(config: TimerConfig) -> (TimerEngine, ManualClock) {
        let clock = ManualClock::new(
            DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        (TimerEngine::with_clock(config, clock.provider()), clock)
    }

    fn run_to_completion(engine: &mut TimerEngine, clock: &ManualClock) -> Option<Event> {
        for _ in 0..engine.remaining_secs() {
            clock.advance(Duration::seconds(1));
            if let Some(event) = engine.tick() {
                return Some(event);
            }
        }
        None
    }

    #[test]
    fn start_pause_resume() {
        let (mut engine, _clock) = engine_at(TimerConfig::default());
        assert_eq!(engine.state(), TimerState::Idle);

        assert!(matches!(engine.start(), Some(Event::TimerStarted { .. })));
        assert_eq!(engine.state(), TimerState::Running);

        assert!(engine.pause().is_some());
        assert_eq!(engine.state(), TimerState::Paused);
        assert!(engine.pause().is_none());

        assert!(matches!(engine.resume(), Some(Event::TimerResumed { .. })));
        assert_eq!(engine.state(), TimerState::Running);
        assert!(engine.start().is_none());
    }

    #[test]
    fn progress_carries_cycle_position_into_a_new_engine() {
        let (mut engine, clock) = engine_at(short_config());
        engine.start();
        run_to_completion(&mut engine, &clock);
        engine.advance();
        let saved = engine.progress();
        assert_eq!(
            saved,
            TimerProgress {
                phase: TimerPhase::ShortBreak,
                completed_pomodoros: 1,
            }
        );

        let (fresh, clock) = engine_at(short_config());
        let mut engine = fresh.with_progress(saved);
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.phase(), TimerPhase::ShortBreak);
        assert_eq!(engine.remaining_secs(), 60);

        engine.start();
        run_to_completion(&mut engine, &clock);
        engine.advance();
        engine.start();
        run_to_completion(&mut engine, &clock);
        engine.advance();
        // Second pomodoro of the cycle earns the long break.
        assert_eq!(engine.phase(), TimerPhase::LongBreak);
        assert_eq!(engine.completed_pomodoros(), 2);
    }

    #[test]
    fn resume_keeps_original_anchor() {
        let (mut engine, clock) = engine_at(TimerConfig::default());
        engine.start();
        let anchor = engine.started_at();
        clock.advance(Duration::minutes(3));
        engine.pause();
        clock.advance(Duration::minutes(1));
        engine.resume();
        assert_eq!(engine.started_at(), anchor);
    }

    #[test]
    fn ticks_only_count_down_while_running() {
        let (mut engine, _clock) = engine_at(TimerConfig::default());
        engine.tick();
        assert_eq!(engine.remaining_secs(), 25 * 60);
        engine.start();
        engine.tick();
        engine.tick();
        assert_eq!(engine.remaining_secs(), 25 * 60 - 2);
        engine.pause();
        engine.tick();
        assert_eq!(engine.remaining_secs(), 25 * 60 - 2);
    }

    #[test]
    fn work_completion_counts_and_waits_for_advance() {
        let (mut engine, clock) = engine_at(short_config());
        engine.start();
        let event = run_to_completion(&mut engine, &clock).expect("completion");

        match event {
            Event::PhaseCompleted(done) => {
                assert_eq!(done.phase, TimerPhase::Work);
                assert_eq!(done.completed_pomodoros, 1);
                assert!(done.started_at.is_some());
            }
            other => panic!("Expected PhaseCompleted, got {other:?}"),
        }
        assert_eq!(engine.state(), TimerState::Completed);
        assert_eq!(engine.phase(), TimerPhase::Work);
        assert!(engine.tick().is_none());

        assert!(engine.advance().is_some());
        assert_eq!(engine.phase(), TimerPhase::ShortBreak);
        assert_eq!(engine.state(), TimerState::Idle);
        assert!(engine.advance().is_none());
    }

    #[test]
    fn break_completion_does_not_count() {
        let (mut engine, clock) = engine_at(short_config());
        engine.skip();
        assert_eq!(engine.phase(), TimerPhase::ShortBreak);
        engine.start();
        run_to_completion(&mut engine, &clock).expect("completion");
        assert_eq!(engine.completed_pomodoros(), 0);
        engine.advance();
        assert_eq!(engine.phase(), TimerPhase::Work);
    }

    #[test]
    fn cycle_reaches_long_break() {
        let (mut engine, clock) = engine_at(short_config());
        let mut phases = Vec::new();
        for _ in 0..4 {
            engine.start();
            run_to_completion(&mut engine, &clock).expect("completion");
            engine.advance();
            phases.push(engine.phase());
        }
        assert_eq!(
            phases,
            vec![
                TimerPhase::ShortBreak,
                TimerPhase::Work,
                TimerPhase::LongBreak,
                TimerPhase::Work
            ]
        );
        assert_eq!(engine.completed_pomodoros(), 2);
    }

    #[test]
    fn skip_from_work_predicts_next_break() {
        let (mut engine, clock) = engine_at(short_config());
        engine.start();
        run_to_completion(&mut engine, &clock);
        engine.advance();
        engine.skip();
        assert_eq!(engine.phase(), TimerPhase::Work);

        // One pomodoro done, cycle of two: skipping now lands on the long break.
        engine.skip();
        assert_eq!(engine.phase(), TimerPhase::LongBreak);
        assert_eq!(engine.completed_pomodoros(), 1);
        assert_eq!(engine.state(), TimerState::Idle);
        assert!(engine.started_at().is_none());
    }

    #[test]
    fn reset_restores_current_phase_duration() {
        let (mut engine, _clock) = engine_at(short_config());
        engine.skip();
        engine.start();
        engine.tick();
        engine.reset();
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.phase(), TimerPhase::ShortBreak);
        assert_eq!(engine.remaining_secs(), 60);
        assert!(engine.started_at().is_none());
    }

    #[test]
    fn auto_advance_starts_next_phase() {
        let (mut engine, clock) = engine_at(TimerConfig {
            auto_advance: true,
            ..short_config()
        });
        engine.start();
        run_to_completion(&mut engine, &clock);
        engine.advance();
        assert_eq!(engine.state(), TimerState::Running);
        assert_eq!(engine.started_at(), Some(clock.now()));
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let (engine, _clock) = engine_at(TimerConfig::default());
        match engine.snapshot() {
            Event::StateSnapshot {
                state,
                phase,
                remaining_secs,
                ..
            } => {
                assert_eq!(state, TimerState::Idle);
                assert_eq!(phase, TimerPhase::Work);
                assert_eq!(remaining_secs, 25 * 60);
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }
}
