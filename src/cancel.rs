//! # Cancellation
//!
//! Every blocking step of a reconciliation (store reads and writes, session
//! acquisition, remote cleanup calls) runs inside a [`CancelScope`]. A scope
//! ends when its token is cancelled (controller shutdown) or when its deadline
//! passes (per-reconcile timeout), whichever comes first. The interrupted step
//! reports [`Cancelled`] so the caller can return it instead of losing track
//! of in-flight work.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a scoped operation stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Cancelled {
    #[error("operation cancelled")]
    Token,
    #[error("reconciliation deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline
#[derive(Debug, Clone)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// Scope that ends only when `token` is cancelled
    #[must_use]
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Scope that also ends `timeout` from now
    #[must_use]
    pub fn with_timeout(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Scope that never ends on its own
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(CancellationToken::new())
    }

    /// Underlying token, e.g. to cancel the scope from elsewhere
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail fast if the scope has already ended
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.token.is_cancelled() {
            return Err(Cancelled::Token);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Cancelled::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the scope ends first
    ///
    /// When the scope ends `fut` is dropped, which aborts any request it had in flight.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Cancelled::Token),
            () = expired => Err(Cancelled::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }

    /// Sleep for `duration` unless the scope ends first
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.run(tokio::time::sleep(duration)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_output() {
        let scope = CancelScope::unbounded();
        assert_eq!(scope.run(async { 42 }).await, Ok(42));
    }

    #[tokio::test]
    async fn test_cancelled_token_wins_over_ready_future() {
        let scope = CancelScope::unbounded();
        scope.token().cancel();
        assert_eq!(scope.check(), Err(Cancelled::Token));
        assert_eq!(scope.run(async { 42 }).await, Err(Cancelled::Token));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_sleep() {
        let scope = CancelScope::with_timeout(CancellationToken::new(), Duration::from_secs(5));
        let result = scope.sleep(Duration::from_secs(60)).await;
        assert_eq!(result, Err(Cancelled::DeadlineExceeded));
        assert_eq!(scope.check(), Err(Cancelled::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_within_deadline_completes() {
        let scope = CancelScope::with_timeout(CancellationToken::new(), Duration::from_secs(5));
        assert_eq!(scope.sleep(Duration::from_secs(1)).await, Ok(()));
        assert_eq!(scope.check(), Ok(()));
    }

    #[tokio::test]
    async fn test_child_token_cancelled_with_parent() {
        let root = CancellationToken::new();
        let scope = CancelScope::new(root.child_token());
        root.cancel();
        assert_eq!(scope.check(), Err(Cancelled::Token));
    }
}
