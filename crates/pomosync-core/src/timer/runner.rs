//! Couples the timer engine with the session recorder.
//!
//! A completion is recorded in the same synchronous step as the transition
//! to `Completed`, before the phase switch clears finished todos.

use crate::events::Event;
use crate::sync::NewSession;
use crate::timer::{SessionRecorder, TaskContext, TimerEngine};

/// What one tick produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Completion followed by the phase switch, in order.
    pub events: Vec<Event>,
    /// Record to hand to the sync engine.
    pub session: Option<NewSession>,
}

impl TickOutcome {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.session.is_none()
    }
}

#[derive(Debug)]
pub struct TimerRunner {
    engine: TimerEngine,
    recorder: SessionRecorder,
    context: TaskContext,
}

impl TimerRunner {
    pub fn new(engine: TimerEngine, context: TaskContext) -> Self {
        Self {
            engine,
            recorder: SessionRecorder::default(),
            context,
        }
    }

    pub fn with_recorder(mut self, recorder: SessionRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TimerEngine {
        &mut self.engine
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut TaskContext {
        &mut self.context
    }

    pub fn tick(&mut self) -> TickOutcome {
        let Some(event) = self.engine.tick() else {
            return TickOutcome::default();
        };

        let session = match &event {
            Event::PhaseCompleted(done) => {
                let record = self.recorder.record(done, &self.context);
                if record.is_some() {
                    self.context.clear_completed();
                }
                record
            }
            _ => None,
        };

        let mut events = vec![event];
        events.extend(self.engine.advance());
        TickOutcome { events, session }
    }
}
