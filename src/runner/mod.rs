//! # Runner: buffered, batched, retrying execution of a callback.
//!
//! The [`Runner`] owns the runtime components of one callback module and
//! orchestrates its lifecycle from the initial stream to graceful
//! termination.
//!
//! - Walk the callback's corpus once at start (and again on poll or
//!   shrink-recovery wakes)
//! - Accept on-demand entries through [`RunnerHandle::buffer`]
//! - Coalesce entries into bounded batches and dispatch them FIFO with
//!   bounded concurrency
//! - Re-queue crashed and explicitly retried batches
//! - Cooperate with a memory monitor through the shrink protocol
//!
//! ## Architecture
//! ```text
//! BatchTask::init ──► EntryStream ──► ┌────────────┐
//! RunnerHandle::buffer ─────────────► │ owner loop │──► JoinSet workers
//! memory monitor ──shrink/shrunk───► │  (Core)    │      task.run(batch)
//! flush / poll timers ─────────────► └────────────┘
//! ```
//!
//! ## Rules
//! - All state transitions are serialized on the owner loop.
//! - Delivery is at-least-once; `run` must be idempotent.
//! - Overflow beyond a shrunken queue maximum is dropped (warn-logged with
//!   a count), then recovered by re-running `init` once the queue drains.

mod builder;
mod core;
mod handle;

pub use builder::RunnerBuilder;
pub use handle::{DebugCount, RunnerHandle};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::RunnerError;
use crate::task::BatchTask;

/// Facade over a running owner loop.
///
/// Created by [`Runner::start`] or [`RunnerBuilder::start`]. Dropping the
/// facade without calling [`Runner::shutdown`] leaves the owner loop
/// running in the background.
pub struct Runner<B: BatchTask> {
    handle: RunnerHandle<B::Entry>,
    token: CancellationToken,
    join: JoinHandle<Result<(), RunnerError>>,
}

impl<B: BatchTask> Runner<B> {
    /// Starts a runner with no subscribers and no memory monitor.
    ///
    /// Must be called from within a tokio runtime. Use
    /// [`Runner::builder`] to attach subscribers or a monitor.
    pub fn start(cfg: crate::Config, task: B) -> Self {
        Self::builder(cfg, task).start()
    }

    /// Returns a builder for optional wiring.
    pub fn builder(cfg: crate::Config, task: B) -> RunnerBuilder<B> {
        RunnerBuilder::new(cfg, task)
    }

    pub(crate) fn new(
        handle: RunnerHandle<B::Entry>,
        token: CancellationToken,
        join: JoinHandle<Result<(), RunnerError>>,
    ) -> Self {
        Self {
            handle,
            token,
            join,
        }
    }

    /// Returns a cloneable handle for submitting work and queries.
    pub fn handle(&self) -> RunnerHandle<B::Entry> {
        self.handle.clone()
    }

    /// Shuts the runner down.
    ///
    /// Stops the timers, cancels the initial stream, refuses new `buffer`
    /// calls, waits up to the configured grace for in-flight batches, then
    /// abandons the rest.
    ///
    /// Returns [`RunnerError::GraceExceeded`] when batches were abandoned.
    pub async fn shutdown(self) -> Result<(), RunnerError> {
        self.token.cancel();
        match self.join.await {
            Ok(result) => result,
            Err(_join) => Err(RunnerError::Closed),
        }
    }
}
