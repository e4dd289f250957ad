//! Run-wide cancellation: a CancellationToken plus an optional overall deadline.
//! The mutator checks the scope before each unit; clients race every
//! request against the token.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation handle owned by one pipeline invocation.
#[derive(Debug, Clone)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelScope {
    /// A scope with no deadline.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A scope that expires `budget` from now.
    pub fn with_budget(budget: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + budget),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `Some(reason)` once the run must stop. A passed deadline wins over a
    /// cancelled token, since the deadline watch cancels the token itself.
    /// Passing the deadline also cancels the token so in-flight requests abort.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.token.cancel();
            return Some(StopReason::DeadlineExceeded);
        }
        self.token.is_cancelled().then_some(StopReason::Cancelled)
    }

    /// Cancel the token when the deadline passes. Returns immediately when
    /// the scope is unbounded.
    pub fn spawn_deadline_watch(&self) -> Option<tokio::task::JoinHandle<()>> {
        let deadline = self.deadline?;
        let token = self.token.clone();
        Some(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline.into()) => token.cancel(),
                _ = token.cancelled() => {}
            }
        }))
    }
}
