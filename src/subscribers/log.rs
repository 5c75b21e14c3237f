//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [init-started] task=balances
//! [starting] task=balances batch=10
//! [retrying] task=balances batch=10
//! [crashed] task=balances batch=10 err="worker panicked"
//! [completed] task=balances
//! [dropped] task=balances count=37
//! [shrunk] task=balances count=50
//! [poll-scheduled] task=balances delay=3s
//! [init-completed] task=balances
//! [shutdown-requested]
//! [all-stopped-within-grace]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::InitStarted => {
                println!("[init-started] task={:?}", e.task);
            }
            EventKind::InitCompleted => {
                println!("[init-completed] task={:?}", e.task);
            }
            EventKind::InitFailed => {
                println!("[init-failed] task={:?} err={:?}", e.task, e.error);
            }
            EventKind::BatchStarting => {
                println!("[starting] task={:?} batch={:?}", e.task, e.batch);
            }
            EventKind::BatchCompleted => {
                println!("[completed] task={:?}", e.task);
            }
            EventKind::BatchRetrying => {
                println!("[retrying] task={:?} batch={:?}", e.task, e.batch);
            }
            EventKind::BatchCrashed => {
                println!("[crashed] task={:?} batch={:?} err={:?}", e.task, e.batch, e.error);
            }
            EventKind::EntriesDropped => {
                println!("[dropped] task={:?} count={:?}", e.task, e.count);
            }
            EventKind::QueueShrunk => {
                println!("[shrunk] task={:?} count={:?}", e.task, e.count);
            }
            EventKind::PollScheduled => {
                println!("[poll-scheduled] task={:?} delay={:?}", e.task, e.delay);
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                println!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded] count={:?}", e.count);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
