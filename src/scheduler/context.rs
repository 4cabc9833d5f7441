//! Solve session context.
//!
//! Carries the session clock through a solve instead of a process-wide
//! start time.

use std::time::{Duration, Instant};

/// Clock and optional overall budget of one solve session.
#[derive(Debug, Clone, Copy)]
pub struct SolveContext {
    started: Instant,
    budget: Option<Duration>,
}

impl SolveContext {
    /// Starts the clock now, without an overall budget.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            budget: None,
        }
    }

    /// Sets an overall budget. Engine calls are capped to what is left of it.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Budget left, if a budget is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.budget.map(|b| b.saturating_sub(self.elapsed()))
    }

    /// Whether the budget is used up.
    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_some_and(|r| r.is_zero())
    }

    /// `limit`, capped to the remaining budget.
    pub fn cap(&self, limit: Duration) -> Duration {
        match self.remaining() {
            Some(r) => limit.min(r),
            None => limit,
        }
    }
}

impl Default for SolveContext {
    fn default() -> Self {
        Self::new()
    }
}
