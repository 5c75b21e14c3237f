//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] — the extension point for plugging custom event
//! handlers into the runner.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Bounded queue** (configurable capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics caught and logged)
//!
//! ## Architecture
//! ```text
//! SubscriberSet ──► [queue] ──► worker task ──► subscriber.on_event()
//!                  (bounded)             └────► panic caught & isolated
//! ```
//!
//! ## Rules
//! - Slow subscribers only affect themselves (queue overflow → event drop)
//! - Panics are **isolated** (do not crash the runner or other subscribers)
//! - Subscribers **do not block** the owner loop
//! - Queue capacity is **per-subscriber** (not global)

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for runner observability.
///
/// Receives events via a dedicated worker task with a bounded queue.
///
/// ### Rules
/// - `on_event()` runs in the subscriber's worker, never in the owner loop
/// - Events are processed sequentially (FIFO order per subscriber)
/// - Queue overflow drops events for this subscriber only
/// - Panics are caught and isolated (the runner continues)
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Use async I/O and handle errors internally; slow processing only
    /// affects this subscriber's queue.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name for logging.
    ///
    /// Keep short and descriptive (e.g., "metrics", "audit").
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// When the queue is full, new events are dropped for this subscriber
    /// only; other subscribers are unaffected.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
