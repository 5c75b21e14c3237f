//! # Runtime events emitted by the runner.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Initial stream events**: the walk of the callback's corpus
//!   (started, completed, failed).
//! - **Batch lifecycle events**: dispatch and completion of batches
//!   (starting, completed, retrying, crashed).
//! - **Queue events**: loss and pressure paths (entries dropped, queue
//!   shrunk, poll scheduled).
//! - **Shutdown events**: graceful termination flow.
//!
//! The [`Event`] struct carries additional metadata such as the task name,
//! batch size, affected entry count, error messages, and the configured
//! metadata label.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, so events can be ordered correctly even when delivered
//! out-of-order through async channels.
//!
//! ## Event flow examples
//!
//! ### Happy path
//! ```text
//! InitStarted
//!   → BatchStarting × n
//!   → BatchCompleted × n
//!   → InitCompleted
//! ```
//!
//! ### Retry flow
//! ```text
//! BatchStarting
//!   → BatchRetrying          (run returned a retry signal)
//!   → BatchStarting          (re-dispatched from the back of the queue)
//!   → BatchCompleted
//! ```
//!
//! ### Memory pressure flow
//! ```text
//! QueueShrunk                (monitor called shrink; count = dropped)
//!   → …queue drains…
//!   → InitStarted            (rehydration re-run)
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Initial stream events ===
    /// The initial-stream walk was spawned.
    InitStarted,
    /// The walk finished and its residual batch was flushed.
    InitCompleted,
    /// The walk failed or panicked; the runner continues with whatever
    /// reached the queue.
    InitFailed,

    // === Batch lifecycle events ===
    /// A batch was handed to a worker.
    BatchStarting,
    /// A worker finished a batch successfully.
    BatchCompleted,
    /// A worker requested a retry; the batch (or its replacement) goes to
    /// the back of the queue.
    BatchRetrying,
    /// A worker panicked; the original batch goes to the back of the queue.
    BatchCrashed,

    // === Queue events ===
    /// The queue rejected entries at its maximum size; `count` entries were
    /// dropped.
    EntriesDropped,
    /// The memory monitor shrank the queue; `count` batches were dropped.
    QueueShrunk,
    /// Poll mode scheduled an initial-stream re-run after `delay`.
    PollScheduled,

    // === Shutdown events ===
    /// Shutdown was requested; the mailbox is closed.
    ShutdownRequested,
    /// All in-flight batches finished within the grace period.
    AllStoppedWithin,
    /// Grace period exceeded; `count` batches were abandoned.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// ## Fields
///
/// - `seq`: Unique sequence number for ordering (monotonically increasing)
/// - `at`: Wall-clock timestamp (may go backwards due to NTP, use for
///   logging only)
/// - `kind`: Event classification
/// - `task`, `batch`, `count`, `delay`, `error`, `meta`: Optional metadata
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Name of the callback task, if applicable.
    pub task: Option<String>,
    /// Size of the affected batch, if relevant.
    pub batch: Option<usize>,
    /// Number of affected entries or batches (drops, shrinks, abandons).
    pub count: Option<usize>,
    /// Scheduling delay (poll re-runs), if relevant.
    pub delay: Option<Duration>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// Opaque configured metadata label.
    pub meta: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            batch: None,
            count: None,
            delay: None,
            error: None,
            meta: None,
        }
    }

    /// Attaches a task name.
    pub fn with_task(mut self, name: impl Into<String>) -> Self {
        self.task = Some(name.into());
        self
    }

    /// Attaches a batch size.
    pub fn with_batch(mut self, size: usize) -> Self {
        self.batch = Some(size);
        self
    }

    /// Attaches an affected entry/batch count.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Attaches a scheduling delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Attaches the configured metadata label.
    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }
}
