//! Lookup budgets for storage calls.

use std::time::{Duration, Instant};

/// A budget shared by every storage call made on behalf of one request.
///
/// Calls are issued sequentially, so a single start instant is enough.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self {
            started: Instant::now(),
            budget: None,
        }
    }

    /// Expire `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget: Some(budget),
        }
    }

    /// Create from an optional millisecond budget.
    pub fn from_millis(budget_ms: Option<u64>) -> Self {
        match budget_ms {
            Some(ms) => Self::after(Duration::from_millis(ms)),
            None => Self::none(),
        }
    }

    /// Time left, or `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.budget
            .map(|budget| budget.saturating_sub(self.started.elapsed()))
    }

    /// Check if the budget is spent.
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Fail if the budget is spent before `op` runs.
    pub fn check(&self, op: &'static str) -> Result<(), DeadlineExceeded> {
        match self.budget {
            Some(budget) if self.is_expired() => Err(DeadlineExceeded { op, budget }),
            _ => Ok(()),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

/// Error when a lookup budget is exceeded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op} exceeded lookup budget of {budget:?}")]
pub struct DeadlineExceeded {
    /// The storage operation that was about to run.
    pub op: &'static str,
    /// The budget that was configured.
    pub budget: Duration,
}
