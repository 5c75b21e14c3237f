//! # Callback abstraction for buffered batch processing.
//!
//! Defines the core [`BatchTask`] trait — the only plug-in surface of the
//! runner.
//!
//! - **[`BatchTask::init`]** — walks the initial corpus, emitting entries
//!   through an [`EntryStream`](crate::EntryStream)
//! - **[`BatchTask::run`]** — processes one batch of entries
//!
//! ## Rules
//! - `init` must eventually terminate. It is called at startup and again on
//!   poll or shrink-recovery wakes, so it **must** be able to re-enumerate
//!   its corpus.
//! - `run` executes on a worker and may block arbitrarily long; timeouts
//!   are the callback's responsibility.
//! - Delivery is at-least-once: `run` must be idempotent, keyed on whatever
//!   identity the entries carry.
//! - The implementing type is the callback state: `&self` is passed to every
//!   call, and interior mutability is the callback's business. State is
//!   never shared with the runner.

use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;

use crate::error::{BatchError, TaskError};
use crate::stream::EntryStream;

/// A buffered batch-processing callback.
///
/// The runner never inspects entries except for equality when deduplication
/// is enabled, hence the `Eq + Hash` bounds; entries in this domain are
/// addresses, hashes, and ids, which are cheap to clone and compare.
///
/// ## Example
///
/// ```
/// use async_trait::async_trait;
/// use batchvisor::{BatchError, BatchTask, EntryStream, TaskError};
///
/// struct BalanceFetcher;
///
/// #[async_trait]
/// impl BatchTask for BalanceFetcher {
///     type Entry = String;
///
///     fn name(&self) -> &str {
///         "balance-fetcher"
///     }
///
///     async fn init(&self, stream: &mut EntryStream<String>) -> Result<(), TaskError> {
///         for address in ["0xa1", "0xb2", "0xc3"] {
///             stream.emit(address.to_string()).await?;
///         }
///         Ok(())
///     }
///
///     async fn run(&self, batch: Vec<String>) -> Result<(), BatchError<String>> {
///         // fetch balances for `batch`, persist them…
///         let _ = batch;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait BatchTask: Send + Sync + 'static {
    /// The opaque unit of work.
    type Entry: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Returns a stable, human-readable task name.
    ///
    /// Used for logging and events.
    fn name(&self) -> &str;

    /// Walks the initial corpus, emitting every entry through `stream`.
    ///
    /// ### Backpressure
    /// [`EntryStream::emit`](crate::EntryStream::emit) suspends whenever a
    /// full batch is waiting on the runner, tying the walk's throughput to
    /// the consumption rate.
    ///
    /// ### Failure
    /// Returning an error (or panicking) terminates the walk; the runner
    /// logs it and continues with whatever reached the queue.
    async fn init(&self, stream: &mut EntryStream<Self::Entry>) -> Result<(), TaskError>;

    /// Processes one batch of entries.
    ///
    /// Returns `Ok(())` when the batch is done, or a [`BatchError`] to hand
    /// work back for re-queueing. A panic is treated like
    /// [`BatchError::Retry`].
    async fn run(&self, batch: Vec<Self::Entry>) -> Result<(), BatchError<Self::Entry>>;
}
