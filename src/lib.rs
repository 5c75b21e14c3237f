//! # batchvisor
//!
//! **Batchvisor** is a buffered, batched, retrying task runner.
//!
//! It fans long-running stream work out over a bounded worker pool: an
//! initial producer enumerates a corpus (possibly millions of entries), an
//! on-demand producer interleaves entries at any time, and the runner
//! coalesces everything into bounded batches, dispatches them with bounded
//! concurrency, retries transient failures, and yields memory back to the
//! system when a memory monitor signals pressure. The crate is designed as
//! a building block for indexers and other ingest pipelines.
//!
//! ## Features
//!
//! | Area                | Description                                                        | Key types / traits                  |
//! |---------------------|--------------------------------------------------------------------|-------------------------------------|
//! | **Callbacks**       | Define the corpus walk and the batch processor.                    | [`BatchTask`], [`EntryStream`]      |
//! | **Running**         | Start, feed, query, and stop a runner.                             | [`Runner`], [`RunnerHandle`]        |
//! | **Batching**        | Bounded FIFO of batches with a shrink protocol.                    | [`BoundQueue`], [`Batcher`]         |
//! | **Memory pressure** | Cooperative shrinking driven by an external monitor.               | [`Shrinkable`], [`MemoryMonitor`]   |
//! | **Observability**   | Subscribe to runtime events (dispatch, retries, drops, shrinks).   | [`Subscribe`], [`Event`]            |
//! | **Errors**          | Typed errors for the runner, the walk, and the retry signal.       | [`RunnerError`], [`BatchError`]     |
//! | **Configuration**   | Centralize runtime settings.                                       | [`Config`]                          |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber
//!   _(demo/reference only)_.
//!
//! ```no_run
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use batchvisor::{BatchError, BatchTask, Config, EntryStream, Runner, TaskError};
//!
//! struct BalanceFetcher;
//!
//! #[async_trait]
//! impl BatchTask for BalanceFetcher {
//!     type Entry = String;
//!
//!     fn name(&self) -> &str {
//!         "balance-fetcher"
//!     }
//!
//!     async fn init(&self, stream: &mut EntryStream<String>) -> Result<(), TaskError> {
//!         // walk the corpus, emitting every known address
//!         for address in ["0xa1", "0xb2", "0xc3"] {
//!             stream.emit(address.to_string()).await?;
//!         }
//!         Ok(())
//!     }
//!
//!     async fn run(&self, batch: Vec<String>) -> Result<(), BatchError<String>> {
//!         // fetch balances for `batch` and persist them
//!         let _ = batch;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.max_batch_size = 100;
//!     cfg.max_concurrent = 8;
//!     cfg.flush_interval = Duration::from_millis(250);
//!
//!     let runner = Runner::start(cfg, BalanceFetcher);
//!     let handle = runner.handle();
//!
//!     // on-demand entries join the same pipeline
//!     handle
//!         .buffer(vec!["0xd4".to_string()], Duration::from_secs(1))
//!         .await?;
//!
//!     runner.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod batcher;
mod config;
mod error;
mod events;
mod monitor;
mod queue;
mod runner;
mod stream;
mod subscribers;
mod task;

// ---- Public re-exports ----

pub use batcher::{partition, Batcher};
pub use config::Config;
pub use error::{BatchError, RunnerError, TaskError};
pub use events::{Event, EventKind};
pub use monitor::{MemoryMonitor, Shrinkable};
pub use queue::BoundQueue;
pub use runner::{DebugCount, Runner, RunnerBuilder, RunnerHandle};
pub use stream::EntryStream;
pub use subscribers::Subscribe;
pub use task::BatchTask;

// Optional: expose a simple built-in logging subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
