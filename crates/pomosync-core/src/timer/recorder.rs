//! Turns WORK-phase completions into session records.

use serde::{Deserialize, Serialize};

use crate::events::PhaseCompletion;
use crate::sync::NewSession;
use crate::timer::TimerPhase;

pub const PLACEHOLDER_TASK: &str = "Focus session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl TodoItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
        }
    }

    pub fn done(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: true,
        }
    }
}

/// What the user is working on right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    #[serde(default)]
    pub current_task: String,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
}

impl TaskContext {
    pub fn with_task(task: impl Into<String>) -> Self {
        Self {
            current_task: task.into(),
            todos: Vec::new(),
        }
    }

    /// Drop todos that were finished during the last work phase.
    pub fn clear_completed(&mut self) {
        self.todos.retain(|t| !t.completed);
    }
}

#[derive(Debug, Clone)]
pub struct SessionRecorder {
    placeholder: String,
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self {
            placeholder: PLACEHOLDER_TASK.to_string(),
        }
    }
}

impl SessionRecorder {
    pub fn with_placeholder(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }

    /// Build the record for a completion. Breaks produce nothing.
    pub fn record(&self, completion: &PhaseCompletion, context: &TaskContext) -> Option<NewSession> {
        if completion.phase != TimerPhase::Work {
            return None;
        }
        let mut record = NewSession::new(
            Self::duration_minutes(completion),
            self.task_label(context),
            true,
        );
        record.start_time = completion.started_at;
        record.end_time = Some(completion.at);
        Some(record)
    }

    /// Completed todos first, then the freeform task, then the placeholder.
    pub fn task_label(&self, context: &TaskContext) -> String {
        let done: Vec<&str> = context
            .todos
            .iter()
            .filter(|t| t.completed)
            .map(|t| t.text.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if !done.is_empty() {
            return done.join(", ");
        }

        let task = context.current_task.trim();
        if !task.is_empty() {
            return task.to_string();
        }

        self.placeholder.clone()
    }

    /// Wall-clock minutes since the anchor, rounded, at least one.
    pub fn duration_minutes(completion: &PhaseCompletion) -> u32 {
        match completion.started_at {
            Some(started) => {
                let secs = (completion.at - started).num_seconds().max(0);
                let minutes = (secs + 30) / 60;
                u32::try_from(minutes).unwrap_or(u32::MAX).max(1)
            }
            None => completion.configured_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn completion(phase: TimerPhase, elapsed: Option<Duration>) -> PhaseCompletion {
        let at = DateTime::parse_from_rfc3339("2026-03-02T09:25:00Z")
            .unwrap()
            .with_timezone(&Utc);
        PhaseCompletion {
            phase,
            completed_pomodoros: 1,
            started_at: elapsed.map(|e| at - e),
            at,
            configured_minutes: 25,
        }
    }

    #[test]
    fn completed_todos_win_over_current_task() {
        let recorder = SessionRecorder::default();
        let context = TaskContext {
            current_task: "Refactor".into(),
            todos: vec![
                TodoItem::done("Write tests"),
                TodoItem::new("Deploy"),
                TodoItem::done("Fix lint"),
            ],
        };
        assert_eq!(recorder.task_label(&context), "Write tests, Fix lint");
    }

    #[test]
    fn falls_back_to_task_then_placeholder() {
        let recorder = SessionRecorder::default();
        let mut context = TaskContext::with_task("  Refactor  ");
        context.todos.push(TodoItem::new("not done"));
        assert_eq!(recorder.task_label(&context), "Refactor");

        assert_eq!(recorder.task_label(&TaskContext::default()), PLACEHOLDER_TASK);
    }

    #[test]
    fn duration_uses_wall_clock_anchor() {
        let done = completion(TimerPhase::Work, Some(Duration::seconds(25 * 60 + 40)));
        assert_eq!(SessionRecorder::duration_minutes(&done), 26);

        let quick = completion(TimerPhase::Work, Some(Duration::seconds(5)));
        assert_eq!(SessionRecorder::duration_minutes(&quick), 1);
    }

    #[test]
    fn missing_anchor_uses_configured_duration() {
        let done = completion(TimerPhase::Work, None);
        assert_eq!(SessionRecorder::duration_minutes(&done), 25);
    }

    #[test]
    fn breaks_are_not_recorded() {
        let recorder = SessionRecorder::default();
        let done = completion(TimerPhase::ShortBreak, Some(Duration::minutes(5)));
        assert!(recorder.record(&done, &TaskContext::default()).is_none());
    }

    #[test]
    fn record_carries_times_and_completed_flag() {
        let recorder = SessionRecorder::default();
        let done = completion(TimerPhase::Work, Some(Duration::minutes(25)));
        let record = recorder
            .record(&done, &TaskContext::with_task("Write spec"))
            .expect("work completion records a session");
        assert_eq!(record.duration, 25);
        assert_eq!(record.task, "Write spec");
        assert!(record.completed);
        assert_eq!(record.end_time, Some(done.at));
        assert_eq!(record.start_time, done.started_at);
    }
}
