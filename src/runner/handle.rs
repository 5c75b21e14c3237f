//! # Handle for talking to a running owner loop.
//!
//! [`RunnerHandle`] is the cloneable front door of a runner: every call is
//! a message through the owner's mailbox, so all state transitions stay
//! serialized on the owner no matter how many handles exist.
//!
//! The handle also implements [`Shrinkable`], which is the face the memory
//! monitor sees.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::RunnerError;
use crate::monitor::Shrinkable;

/// Messages accepted by the owner loop.
pub(crate) enum Msg<T> {
    /// Append entries to the current buffer (on-demand producer).
    Buffer { entries: Vec<T> },
    /// Report the pending-work estimate.
    DebugCount { reply: oneshot::Sender<DebugCount> },
    /// Shrink the bound queue (memory monitor).
    Shrink { reply: oneshot::Sender<Result<(), RunnerError>> },
    /// Query whether the queue has ever been shrunk.
    Shrunk { reply: oneshot::Sender<bool> },
    /// Start the initial stream (poll wake or rehydration).
    RunInit,
}

/// Upper-bound estimate of pending work.
///
/// `buffer` counts unflushed entries plus queued batches at their maximum
/// size, so it over-estimates when the queue holds partial batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugCount {
    /// Estimated entries awaiting dispatch.
    pub buffer: usize,
    /// Batches currently executing.
    pub tasks: usize,
}

/// Cloneable handle for submitting work and queries to a runner.
pub struct RunnerHandle<T> {
    tx: mpsc::Sender<Msg<T>>,
    token: CancellationToken,
}

impl<T> Clone for RunnerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T: Send + 'static> RunnerHandle<T> {
    pub(crate) fn new(tx: mpsc::Sender<Msg<T>>, token: CancellationToken) -> Self {
        Self { tx, token }
    }

    /// Appends `entries` as one list onto the runner's current buffer.
    ///
    /// Returns as soon as the owner admits the message; `timeout` bounds
    /// only that admission handshake, never the processing of the entries.
    /// An empty list is accepted and ignored.
    pub async fn buffer(&self, entries: Vec<T>, timeout: Duration) -> Result<(), RunnerError> {
        if self.token.is_cancelled() {
            return Err(RunnerError::Closed);
        }
        if entries.is_empty() {
            return Ok(());
        }
        self.tx
            .send_timeout(Msg::Buffer { entries }, timeout)
            .await
            .map_err(|error| match error {
                mpsc::error::SendTimeoutError::Timeout(_) => {
                    RunnerError::AdmissionTimeout { timeout }
                }
                mpsc::error::SendTimeoutError::Closed(_) => RunnerError::Closed,
            })
    }

    /// Returns an upper-bound estimate of pending entries and running
    /// batches.
    pub async fn debug_count(&self) -> Result<DebugCount, RunnerError> {
        self.request(|reply| Msg::DebugCount { reply }).await
    }

    /// Halves the queue maximum and drops overflow.
    ///
    /// Returns [`RunnerError::MinimumSize`] at the floor.
    pub async fn shrink(&self) -> Result<(), RunnerError> {
        self.request(|reply| Msg::Shrink { reply }).await?
    }

    /// Returns whether the queue has ever been shrunk.
    pub async fn shrunk(&self) -> Result<bool, RunnerError> {
        self.request(|reply| Msg::Shrunk { reply }).await
    }

    /// Round-trips a request message through the owner.
    async fn request<R>(
        &self,
        message: impl FnOnce(oneshot::Sender<R>) -> Msg<T>,
    ) -> Result<R, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(message(reply))
            .await
            .map_err(|_| RunnerError::Closed)?;
        rx.await.map_err(|_| RunnerError::Closed)
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Shrinkable for RunnerHandle<T> {
    async fn shrink(&self) -> Result<(), RunnerError> {
        RunnerHandle::shrink(self).await
    }

    async fn shrunk(&self) -> bool {
        RunnerHandle::shrunk(self).await.unwrap_or(false)
    }
}
