//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for a runner instance.
//!
//! Config is consumed once by [`Runner::start`](crate::Runner::start) (or
//! [`RunnerBuilder`](crate::RunnerBuilder)) and is immutable afterwards.
//!
//! ## Sentinel values
//! - `max_batch_size = 0` and `max_concurrent = 0` are clamped to 1.
//! - `flush_interval = 0` and `poll_interval = 0` are clamped to 1 ms.
//! - `bus_capacity` / `mailbox_capacity` have a minimum of 1.
//!
//! Prefer the `*_clamped()` accessors over reading fields directly to avoid
//! sprinkling sentinel checks across the codebase.

use std::time::Duration;

/// Global configuration for a runner instance.
///
/// Controls batching, concurrency, flush/poll cadence, deduplication,
/// channel capacities, and shutdown behavior.
#[derive(Clone, Debug)]
pub struct Config {
    /// How often the current buffer is promoted into the bound queue.
    ///
    /// Shorter intervals lower latency for `buffer`ed entries at the cost of
    /// smaller, more frequent batches.
    pub flush_interval: Duration,

    /// Delay before re-running the initial stream in poll mode.
    ///
    /// Only consulted when `poll` is `true`.
    pub poll_interval: Duration,

    /// Maximum number of entries per batch handed to `run`.
    pub max_batch_size: usize,

    /// Maximum number of batches executing concurrently.
    pub max_concurrent: usize,

    /// Whether to re-run the initial stream when the queue is empty at flush
    /// time.
    pub poll: bool,

    /// Whether to drop, from every push into the runner, entries already
    /// queued or currently executing.
    pub dedup_entries: bool,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events will
    /// skip older items. Minimum value is 1 (enforced by the bus).
    pub bus_capacity: usize,

    /// Capacity of the owner mailbox.
    ///
    /// A full mailbox makes `buffer` wait for admission, which is the
    /// caller-facing backpressure point.
    pub mailbox_capacity: usize,

    /// Maximum time to wait for in-flight batches on shutdown before
    /// abandoning them.
    pub grace: Duration,

    /// Opaque label propagated into worker logging contexts and events.
    pub metadata: Option<String>,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `flush_interval = 1s`
    /// - `poll_interval = 3s`
    /// - `max_batch_size = 10`
    /// - `max_concurrent = 4`
    /// - `poll = false`
    /// - `dedup_entries = false`
    /// - `bus_capacity = 1024`
    /// - `mailbox_capacity = 128`
    /// - `grace = 30s`
    /// - `metadata = None`
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(3),
            max_batch_size: 10,
            max_concurrent: 4,
            poll: false,
            dedup_entries: false,
            bus_capacity: 1024,
            mailbox_capacity: 128,
            grace: Duration::from_secs(30),
            metadata: None,
        }
    }
}

impl Config {
    /// Batch size with the zero sentinel clamped to 1.
    pub fn max_batch_size_clamped(&self) -> usize {
        self.max_batch_size.max(1)
    }

    /// Concurrency limit with the zero sentinel clamped to 1.
    pub fn max_concurrent_clamped(&self) -> usize {
        self.max_concurrent.max(1)
    }

    /// Flush interval with a 1 ms floor (a zero-period timer cannot be
    /// armed).
    pub fn flush_interval_clamped(&self) -> Duration {
        self.flush_interval.max(Duration::from_millis(1))
    }

    /// Poll interval with a 1 ms floor.
    pub fn poll_interval_clamped(&self) -> Duration {
        self.poll_interval.max(Duration::from_millis(1))
    }

    /// Bus capacity with a floor of 1.
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Mailbox capacity with a floor of 1.
    pub fn mailbox_capacity_clamped(&self) -> usize {
        self.mailbox_capacity.max(1)
    }
}
