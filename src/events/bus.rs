//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that lets the
//! owner loop and the initial-stream driver broadcast [`Event`]s to
//! subscribers.
//!
//! - **Broadcast semantics**: all active receivers get a clone of each event
//! - **Non-persistent**: events published with no receivers are dropped
//! - **Bounded capacity**: receivers lagging past the capacity skip old
//!   events
//!
//! Used internally to deliver lifecycle events to the subscriber fan-out.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (floor of 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// Errors are ignored if there are no active subscribers; the runner
    /// operates fine without observers.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Subscribes to the bus and returns a new receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
