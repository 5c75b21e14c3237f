//! # Error types used by the batchvisor runtime and callbacks.
//!
//! This module defines three error enums:
//!
//! - [`RunnerError`] errors raised by the runner facade and owner loop.
//! - [`TaskError`] errors raised by the initial-stream walk of a callback.
//! - [`BatchError`] the failure signal a callback's `run` returns to request
//!   a retry.
//!
//! [`RunnerError`] and [`TaskError`] provide `as_label` helpers returning
//! stable snake_case tokens for logs and metrics.

use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the runner itself.
///
/// These represent failures of the orchestration layer, not of the
/// user-supplied callback.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The caller's `buffer` call was not admitted within its timeout.
    ///
    /// The timeout bounds only the admission handshake with the owner;
    /// runner state is unchanged when this is returned.
    #[error("buffer admission timed out after {timeout:?}")]
    AdmissionTimeout {
        /// The caller-supplied admission timeout.
        timeout: Duration,
    },

    /// The runner has shut down and no longer accepts requests.
    #[error("runner is shut down")]
    Closed,

    /// The memory monitor asked to shrink a queue already at its floor.
    #[error("queue is already at its minimum size")]
    MinimumSize,

    /// Shutdown grace period elapsed with batches still running; the
    /// remaining workers were abandoned.
    #[error("shutdown grace {grace:?} exceeded; {pending} batches abandoned")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of batches still in flight when the grace elapsed.
        pending: usize,
    },
}

impl RunnerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RunnerError::AdmissionTimeout { .. } => "runner_admission_timeout",
            RunnerError::Closed => "runner_closed",
            RunnerError::MinimumSize => "runner_minimum_size",
            RunnerError::GraceExceeded { .. } => "runner_grace_exceeded",
        }
    }
}

/// # Errors produced by the initial-stream walk.
///
/// Returned by [`BatchTask::init`](crate::BatchTask::init) and by
/// [`EntryStream::emit`](crate::EntryStream::emit). A failed walk is logged
/// and the runner continues with whatever reached the queue.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The walk failed; the runner keeps the entries emitted so far.
    #[error("initial stream failed: {reason}")]
    Fail { reason: String },

    /// The walk was canceled because the runner is shutting down.
    ///
    /// This is **not an error** in the traditional sense, but signals
    /// intentional termination.
    #[error("initial stream canceled")]
    Canceled,
}

impl TaskError {
    /// Creates a [`TaskError::Fail`] from any displayable reason.
    pub fn fail(reason: impl ToString) -> Self {
        TaskError::Fail {
            reason: reason.to_string(),
        }
    }

    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }
}

/// # Retry signal returned by a callback's `run`.
///
/// `run` returning `Ok(())` marks the batch done; returning one of these
/// variants hands work back to the runner for re-queueing. Retries are
/// unbounded by the runner; rate limiting is the callback's responsibility.
#[derive(Error, Debug)]
pub enum BatchError<T> {
    /// Re-queue the original batch unchanged (same entries, same order).
    #[error("batch failed; retrying the same entries")]
    Retry,

    /// Re-queue the given replacement entries instead of the original batch.
    ///
    /// The replacement list must be non-empty. It is re-queued as a single
    /// batch even when longer than `max_batch_size`; callers are expected to
    /// respect the batch size themselves.
    #[error("batch failed; retrying {} replacement entries", .0.len())]
    RetryWith(Vec<T>),
}
