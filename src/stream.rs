//! # Initial-stream reducer and driver.
//!
//! This module drives one walk of a callback's corpus: the callback's
//! `init` emits entries through an [`EntryStream`], which accumulates them
//! into batches of up to `max_batch_size` and hands each completed batch to
//! the runner.
//!
//! # High-level architecture:
//!
//! ```text
//!   ┌───────────────┐
//!   │ BatchTask::init│
//!   └───────┬───────┘
//!        emit(entry)
//!           ▼
//!   ┌───────────────┐  full batch   ┌─────────────┐
//!   │  EntryStream  │ ────────────► │ owner loop  │
//!   │  (Batcher)    │  capacity-1   │ (push_back) │
//!   └───────────────┘   channel     └─────────────┘
//! ```
//!
//! - The channel capacity of 1 is the backpressure point: `emit` suspends
//!   while a completed batch is waiting on the owner.
//! - On success, the residual partial batch is flushed.
//! - On error or panic, the walk is logged and terminated; the owner treats
//!   both outcomes as "init complete".
//! - The driver is cancellable via its token; shutdown abandons the walk.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::batcher::Batcher;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::task::BatchTask;

/// Reducer handed to [`BatchTask::init`].
///
/// Each [`emit`](EntryStream::emit) call appends to an accumulator; when the
/// accumulator reaches the batch size, the completed batch is sent to the
/// runner and the accumulator resets.
pub struct EntryStream<T> {
    batcher: Batcher<T>,
    tx: mpsc::Sender<Vec<T>>,
}

impl<T: Send> EntryStream<T> {
    pub(crate) fn new(capacity: usize, tx: mpsc::Sender<Vec<T>>) -> Self {
        Self {
            batcher: Batcher::new(capacity),
            tx,
        }
    }

    /// Emits one entry into the stream.
    ///
    /// Suspends while a completed batch is waiting to be admitted by the
    /// runner. Returns [`TaskError::Canceled`] when the runner is gone,
    /// which `init` implementations should propagate with `?`.
    pub async fn emit(&mut self, entry: T) -> Result<(), TaskError> {
        if let Some(batch) = self.batcher.push(entry) {
            self.tx
                .send(batch)
                .await
                .map_err(|_| TaskError::Canceled)?;
        }
        Ok(())
    }

    /// Flushes the residual partial batch after a successful walk.
    async fn finish(mut self) -> Result<(), TaskError> {
        if let Some(rest) = self.batcher.flush() {
            self.tx
                .send(rest)
                .await
                .map_err(|_| TaskError::Canceled)?;
        }
        Ok(())
    }
}

/// Spawns one walk of `task.init` in a background worker.
///
/// Returns the receiving side of the capacity-1 batch channel; the channel
/// closing (for any reason) is the owner's "init complete" signal.
pub(crate) fn spawn<B: BatchTask>(
    task: Arc<B>,
    capacity: usize,
    token: CancellationToken,
    bus: Bus,
    meta: Option<String>,
) -> mpsc::Receiver<Vec<B::Entry>> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let tag = |kind: EventKind| {
            let event = Event::now(kind).with_task(task.name());
            match &meta {
                Some(meta) => event.with_meta(meta.clone()),
                None => event,
            }
        };
        bus.publish(tag(EventKind::InitStarted));

        let mut stream = EntryStream::new(capacity, tx);
        let walk = std::panic::AssertUnwindSafe(task.init(&mut stream)).catch_unwind();

        let outcome = tokio::select! {
            _ = token.cancelled() => {
                debug!(task = task.name(), "initial stream canceled");
                return;
            }
            outcome = walk => outcome,
        };

        match outcome {
            Ok(Ok(())) => {
                if stream.finish().await.is_ok() {
                    bus.publish(tag(EventKind::InitCompleted));
                }
            }
            Ok(Err(error)) => {
                warn!(task = task.name(), error = %error, "initial stream failed");
                bus.publish(tag(EventKind::InitFailed).with_error(error.to_string()));
            }
            Err(_panic) => {
                warn!(task = task.name(), "initial stream panicked");
                bus.publish(tag(EventKind::InitFailed).with_error("panic"));
            }
        }
    });

    rx
}
