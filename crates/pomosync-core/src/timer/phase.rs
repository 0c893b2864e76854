use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Work,
    ShortBreak,
    LongBreak,
}

impl TimerPhase {
    pub fn label(&self) -> &'static str {
        match self {
            TimerPhase::Work => "Focus",
            TimerPhase::ShortBreak => "Short Break",
            TimerPhase::LongBreak => "Long Break",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, TimerPhase::Work)
    }
}

/// Phase durations and cycle length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    #[serde(default = "default_pomodoros_until_long_break")]
    pub pomodoros_until_long_break: u32,
    /// Start the next phase automatically after a completion.
    #[serde(default = "default_true")]
    pub auto_advance: bool,
}

fn default_work_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_pomodoros_until_long_break() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            pomodoros_until_long_break: default_pomodoros_until_long_break(),
            auto_advance: true,
        }
    }
}

impl TimerConfig {
    pub fn duration_minutes(&self, phase: TimerPhase) -> u32 {
        match phase {
            TimerPhase::Work => self.work_minutes,
            TimerPhase::ShortBreak => self.short_break_minutes,
            TimerPhase::LongBreak => self.long_break_minutes,
        }
    }

    /// Uses saturating arithmetic so absurd values cannot overflow.
    pub fn duration_secs(&self, phase: TimerPhase) -> u64 {
        u64::from(self.duration_minutes(phase)).saturating_mul(60)
    }

    /// The break that follows the `nth` completed pomodoro.
    pub fn break_after(&self, nth: u32) -> TimerPhase {
        let cycle = self.pomodoros_until_long_break.max(1);
        if nth > 0 && nth % cycle == 0 {
            TimerPhase::LongBreak
        } else {
            TimerPhase::ShortBreak
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.work_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.work_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.pomodoros_until_long_break == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.pomodoros_until_long_break".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
