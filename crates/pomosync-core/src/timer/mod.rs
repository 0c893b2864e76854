mod engine;
mod phase;
mod recorder;
mod runner;

pub use engine::{TimerEngine, TimerProgress, TimerState};
pub use phase::{TimerConfig, TimerPhase};
pub use recorder::{SessionRecorder, TaskContext, TodoItem, PLACEHOLDER_TASK};
pub use runner::{TickOutcome, TimerRunner};
