use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Operation, RpcError};

/// Per-call deadline and cancellation signal.
///
/// Cloning a context shares its cancellation token, so cancelling any clone
/// cancels every call bound to it. Calls bound to other contexts are untouched.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Default::default()
    }

    /// Context that expires `timeout` from now.
    pub fn timeout(timeout: Duration) -> Self {
        Self::new().with_timeout(timeout)
    }

    /// Tightens the deadline to `timeout` from now. An earlier deadline wins.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Binds the context to an externally owned token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drives `call` until it finishes, the context is cancelled, or the
    /// deadline passes, whichever comes first. The losing future is dropped.
    pub async fn scope<T, F>(&self, operation: Operation, call: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(RpcError::Cancelled { operation });
        }
        if matches!(self.remaining(), Some(left) if left.is_zero()) {
            return Err(RpcError::DeadlineExceeded { operation });
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RpcError::Cancelled { operation }),
            _ = wait_for(self.deadline) => Err(RpcError::DeadlineExceeded { operation }),
            result = call => result,
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
