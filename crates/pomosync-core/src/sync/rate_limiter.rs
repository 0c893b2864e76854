//! Single-flight gate and throttle for refresh cycles.
//!
//! The gate is measured from the start of the previous attempt, so a failed
//! attempt spaces the next one just like a successful one. A 5xx stretches
//! the interval by the backoff factor (up to the cap); the next fully
//! successful cycle, or an explicit reset, puts it back to the baseline.

use chrono::{DateTime, Duration, Utc};

use crate::clock::{system_clock, NowProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub backoff_factor: i32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::seconds(60),
            max_interval: Duration::seconds(600),
            backoff_factor: 2,
        }
    }
}

/// Answer to "may a refresh start now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Open,
    InFlight,
    Throttled { wait: Duration },
}

/// How a refresh cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Both datasets loaded.
    Success,
    /// Something failed, but not the server.
    Failed,
    /// At least one 5xx was observed.
    ServerError,
}

/// Proof that the holder started the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    cycle: u64,
}

pub struct RateLimiter {
    config: RateLimiterConfig,
    interval: Duration,
    in_flight: bool,
    last_attempt_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    cycle: u64,
    now: NowProvider,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("interval", &self.interval)
            .field("in_flight", &self.in_flight)
            .field("last_attempt_at", &self.last_attempt_at)
            .field("last_success_at", &self.last_success_at)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: RateLimiterConfig, now: NowProvider) -> Self {
        Self {
            interval: config.min_interval,
            config,
            in_flight: false,
            last_attempt_at: None,
            last_success_at: None,
            cycle: 0,
            now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at
    }

    pub fn check(&self) -> Gate {
        if self.in_flight {
            return Gate::InFlight;
        }
        match self.last_attempt_at {
            Some(last) => {
                let elapsed = (self.now)() - last;
                if elapsed < self.interval {
                    Gate::Throttled {
                        wait: self.interval - elapsed,
                    }
                } else {
                    Gate::Open
                }
            }
            None => Gate::Open,
        }
    }

    /// Check the gate and, if open, mark a cycle as started.
    pub fn try_acquire(&mut self) -> Result<RefreshTicket, Gate> {
        match self.check() {
            Gate::Open => {
                self.cycle += 1;
                self.in_flight = true;
                self.last_attempt_at = Some((self.now)());
                Ok(RefreshTicket { cycle: self.cycle })
            }
            closed => Err(closed),
        }
    }

    pub fn is_current(&self, ticket: RefreshTicket) -> bool {
        ticket.cycle == self.cycle
    }

    /// Mark the cycle finished. Tickets from before a reset are ignored.
    pub fn finish(&mut self, ticket: RefreshTicket, outcome: RefreshOutcome) {
        if !self.is_current(ticket) {
            return;
        }
        self.in_flight = false;
        match outcome {
            RefreshOutcome::Success => {
                self.last_success_at = Some((self.now)());
                self.interval = self.config.min_interval;
            }
            RefreshOutcome::ServerError => {
                let stretched = self.interval * self.config.backoff_factor.max(1);
                self.interval = stretched.min(self.config.max_interval);
            }
            RefreshOutcome::Failed => {}
        }
    }

    /// Forget throttle, in-flight and escalation state.
    pub fn reset(&mut self) {
        self.cycle += 1;
        self.in_flight = false;
        self.last_attempt_at = None;
        self.interval = self.config.min_interval;
    }
}
