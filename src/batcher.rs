//! # Fixed-size batching of entry streams.
//!
//! [`Batcher`] partitions a stream of entries into batches of up to a fixed
//! capacity. It is a deterministic accumulator: size limits are enforced
//! only by [`Batcher::push`], and a final [`Batcher::flush`] surfaces the
//! residual partial batch.
//!
//! The initial-stream reducer ([`EntryStream`](crate::EntryStream)) holds a
//! `Batcher` in the init worker; the owner uses [`partition`] when promoting
//! the current buffer at flush time.

use std::mem;

/// Accumulates entries and yields a full batch each time `capacity` is
/// reached.
#[derive(Debug)]
pub struct Batcher<T> {
    capacity: usize,
    acc: Vec<T>,
}

impl<T> Batcher<T> {
    /// Creates a batcher for batches of up to `capacity` entries
    /// (floor of 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            acc: Vec::with_capacity(capacity),
        }
    }

    /// Number of accumulated entries not yet surfaced as a batch.
    pub fn len(&self) -> usize {
        self.acc.len()
    }

    /// Returns true when no entries are accumulated.
    pub fn is_empty(&self) -> bool {
        self.acc.is_empty()
    }

    /// Adds an entry; returns a full batch when the capacity is reached.
    pub fn push(&mut self, entry: T) -> Option<Vec<T>> {
        self.acc.push(entry);
        if self.acc.len() >= self.capacity {
            Some(mem::replace(
                &mut self.acc,
                Vec::with_capacity(self.capacity),
            ))
        } else {
            None
        }
    }

    /// Surfaces the residual partial batch, if any.
    pub fn flush(&mut self) -> Option<Vec<T>> {
        if self.acc.is_empty() {
            None
        } else {
            Some(mem::take(&mut self.acc))
        }
    }
}

/// Partitions `entries` into batches of up to `capacity`, preserving order.
///
/// Only the last batch may be shorter than `capacity`.
pub fn partition<T>(entries: impl IntoIterator<Item = T>, capacity: usize) -> Vec<Vec<T>> {
    let mut batcher = Batcher::new(capacity);
    let mut batches = Vec::new();

    for entry in entries {
        if let Some(full) = batcher.push(entry) {
            batches.push(full);
        }
    }
    if let Some(rest) = batcher.flush() {
        batches.push(rest);
    }
    batches
}
