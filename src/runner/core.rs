//! # Owner loop: the single-writer core of a runner.
//!
//! [`Core`] owns every piece of mutable runner state and serializes all
//! transitions through one `select` loop. Workers, the initial-stream
//! driver, timers, and external handles never touch the state directly;
//! they talk to the owner through channels.
//!
//! ## Architecture
//! ```text
//! RunnerHandle ──mailbox──► ┌────────────────────────────┐
//! init driver ──batches───► │          Core              │
//! flush timer ──ticks─────► │  current buffer            │
//! JoinSet ──worker results► │  bound queue (batches)     │
//!                           │  in-flight map             │
//!                           └──────────┬─────────────────┘
//!                                 dispatch()
//!                                      ▼
//!                           JoinSet worker: task.run(batch)
//! ```
//!
//! ## Rules
//! - The dispatcher keeps `in_flight ≤ max_concurrent` and pops batches
//!   FIFO.
//! - Worker results are processed in arrival order, not dispatch order.
//! - Every push edge (stream batches, flush promotion, retries) passes
//!   through the same dedup filter when `dedup_entries` is on.
//! - A crash (worker panic) is handled exactly like an explicit retry.
//! - Overflow rejected by the bound queue is dropped with a warn log
//!   carrying the entry count; this is the sole loss path.
//! - The shrink-recovery `init` re-run fires when a dispatch drains a
//!   shrunken queue to empty, or when the monitor shrinks an already-empty
//!   queue.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::batcher;
use crate::config::Config;
use crate::error::{BatchError, RunnerError};
use crate::events::{Bus, Event, EventKind};
use crate::queue::BoundQueue;
use crate::stream;
use crate::task::BatchTask;

use super::handle::{DebugCount, Msg};

/// Progress of the initial-stream walk.
enum InitState {
    /// A driver is walking the corpus.
    Running,
    /// The walk finished (successfully or not).
    Complete,
    /// A poll wake is pending; the next `RunInit` starts a new walk.
    Scheduled,
}

/// One turn of the owner loop, extracted from the `select` so state
/// handlers run without the select futures alive.
enum Step<T> {
    Shutdown,
    Message(Msg<T>),
    StreamBatch(Vec<T>),
    StreamEnd,
    Worker(Result<(Id, Result<(), BatchError<T>>), JoinError>),
    Flush,
}

/// Single-writer owner of all runner state.
pub(crate) struct Core<B: BatchTask> {
    cfg: Config,
    max_batch: usize,
    max_concurrent: usize,
    task: Arc<B>,
    bus: Bus,
    rx: mpsc::Receiver<Msg<B::Entry>>,
    tx: mpsc::Sender<Msg<B::Entry>>,
    token: CancellationToken,
    queue: BoundQueue<Vec<B::Entry>>,
    current: Vec<B::Entry>,
    in_flight: HashMap<Id, Vec<B::Entry>>,
    workers: JoinSet<Result<(), BatchError<B::Entry>>>,
    stream_rx: Option<mpsc::Receiver<Vec<B::Entry>>>,
    init: InitState,
}

impl<B: BatchTask> Core<B> {
    pub(crate) fn new(
        cfg: Config,
        task: Arc<B>,
        bus: Bus,
        rx: mpsc::Receiver<Msg<B::Entry>>,
        tx: mpsc::Sender<Msg<B::Entry>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            max_batch: cfg.max_batch_size_clamped(),
            max_concurrent: cfg.max_concurrent_clamped(),
            cfg,
            task,
            bus,
            rx,
            tx,
            token,
            queue: BoundQueue::new(None),
            current: Vec::new(),
            in_flight: HashMap::new(),
            workers: JoinSet::new(),
            stream_rx: None,
            init: InitState::Complete,
        }
    }

    /// Runs the owner until shutdown, then drains with the configured grace.
    pub(crate) async fn run(mut self) -> Result<(), RunnerError> {
        self.start_init();

        let token = self.token.clone();
        let period = self.cfg.flush_interval_clamped();
        let mut flush = time::interval_at(time::Instant::now() + period, period);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                _ = token.cancelled() => Step::Shutdown,
                Some(msg) = self.rx.recv() => Step::Message(msg),
                batch = next_stream_batch(&mut self.stream_rx), if self.stream_rx.is_some() => {
                    match batch {
                        Some(batch) => Step::StreamBatch(batch),
                        None => Step::StreamEnd,
                    }
                }
                Some(result) = self.workers.join_next_with_id(), if !self.workers.is_empty() => {
                    Step::Worker(result)
                }
                _ = flush.tick() => Step::Flush,
            };

            match step {
                Step::Shutdown => break,
                Step::Message(msg) => self.on_message(msg),
                Step::StreamBatch(batch) => self.on_stream_batch(batch),
                Step::StreamEnd => self.on_stream_end(),
                Step::Worker(result) => self.on_worker(result),
                Step::Flush => self.on_flush(),
            }
        }

        self.drain().await
    }

    // ---------------------------
    // Mailbox
    // ---------------------------

    fn on_message(&mut self, msg: Msg<B::Entry>) {
        match msg {
            Msg::Buffer { entries } => self.current.extend(entries),
            Msg::DebugCount { reply } => {
                let _ = reply.send(self.debug_count());
            }
            Msg::Shrink { reply } => {
                let _ = reply.send(self.on_shrink());
            }
            Msg::Shrunk { reply } => {
                let _ = reply.send(self.queue.shrunk());
            }
            Msg::RunInit => {
                if matches!(self.init, InitState::Scheduled) {
                    self.start_init();
                }
            }
        }
    }

    fn debug_count(&self) -> DebugCount {
        DebugCount {
            buffer: self.current.len() + self.queue.len() * self.max_batch,
            tasks: self.in_flight.len(),
        }
    }

    fn on_shrink(&mut self) -> Result<(), RunnerError> {
        let dropped = self.queue.shrink()?;
        warn!(
            dropped,
            maximum = ?self.queue.maximum(),
            "queue shrunk under memory pressure"
        );
        self.bus
            .publish(self.event(EventKind::QueueShrunk).with_count(dropped));
        self.maybe_rehydrate();
        Ok(())
    }

    // ---------------------------
    // Initial stream
    // ---------------------------

    fn start_init(&mut self) {
        self.init = InitState::Running;
        self.stream_rx = Some(stream::spawn(
            Arc::clone(&self.task),
            self.max_batch,
            self.token.child_token(),
            self.bus.clone(),
            self.cfg.metadata.clone(),
        ));
    }

    fn on_stream_batch(&mut self, batch: Vec<B::Entry>) {
        self.push_entries(batch, false);
        self.dispatch();
    }

    fn on_stream_end(&mut self) {
        self.stream_rx = None;
        self.init = InitState::Complete;
        self.dispatch();
    }

    // ---------------------------
    // Dispatch and retry
    // ---------------------------

    /// Fills free worker slots from the front of the queue.
    fn dispatch(&mut self) {
        let mut popped = false;
        while self.in_flight.len() < self.max_concurrent {
            let Some(batch) = self.queue.pop_front() else {
                break;
            };
            popped = true;
            self.spawn_worker(batch);
        }
        if popped {
            self.maybe_rehydrate();
        }
    }

    fn spawn_worker(&mut self, batch: Vec<B::Entry>) {
        let size = batch.len();
        let task = Arc::clone(&self.task);
        let work = batch.clone();
        let span = tracing::info_span!(
            "batch_run",
            task = self.task.name(),
            batch = size,
            metadata = self.cfg.metadata.as_deref().unwrap_or_default(),
        );

        let handle = self
            .workers
            .spawn(async move { task.run(work).await }.instrument(span));
        self.in_flight.insert(handle.id(), batch);
        self.bus
            .publish(self.event(EventKind::BatchStarting).with_batch(size));
    }

    fn on_worker(&mut self, result: Result<(Id, Result<(), BatchError<B::Entry>>), JoinError>) {
        match result {
            Ok((id, Ok(()))) => {
                self.in_flight.remove(&id);
                self.bus.publish(self.event(EventKind::BatchCompleted));
            }
            Ok((id, Err(BatchError::Retry))) => {
                if let Some(batch) = self.in_flight.remove(&id) {
                    self.bus
                        .publish(self.event(EventKind::BatchRetrying).with_batch(batch.len()));
                    self.push_entries(batch, false);
                }
            }
            Ok((id, Err(BatchError::RetryWith(entries)))) => {
                self.in_flight.remove(&id);
                if entries.is_empty() {
                    debug!("empty replacement batch on retry; nothing to requeue");
                } else {
                    self.bus
                        .publish(self.event(EventKind::BatchRetrying).with_batch(entries.len()));
                    self.push_entries(entries, false);
                }
            }
            Err(join_error) => {
                let Some(batch) = self.in_flight.remove(&join_error.id()) else {
                    return;
                };
                if join_error.is_cancelled() {
                    return;
                }
                warn!(batch = batch.len(), error = %join_error, "batch worker crashed; requeueing");
                self.bus.publish(
                    self.event(EventKind::BatchCrashed)
                        .with_batch(batch.len())
                        .with_error(join_error.to_string()),
                );
                self.push_entries(batch, false);
            }
        }
        self.dispatch();
    }

    // ---------------------------
    // Flush and poll
    // ---------------------------

    fn on_flush(&mut self) {
        if !self.current.is_empty() {
            let entries = mem::take(&mut self.current);
            self.push_entries(entries, true);
        }
        if self.cfg.poll && self.queue.is_empty() && matches!(self.init, InitState::Complete) {
            self.schedule_poll();
        }
        self.dispatch();
    }

    fn schedule_poll(&mut self) {
        self.init = InitState::Scheduled;
        let delay = self.cfg.poll_interval_clamped();
        self.bus
            .publish(self.event(EventKind::PollScheduled).with_delay(delay));

        let tx = self.tx.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = time::sleep(delay) => {
                    let _ = tx.send(Msg::RunInit).await;
                }
            }
        });
    }

    // ---------------------------
    // Queue edges
    // ---------------------------

    /// Pushes entries onto the bound queue through the dedup filter.
    ///
    /// With `chunk`, entries are partitioned into `max_batch` batches
    /// (flush promotion); without it, they form a single batch (stream
    /// batches and retries, which may legitimately exceed `max_batch`).
    fn push_entries(&mut self, mut entries: Vec<B::Entry>, chunk: bool) {
        self.filter_seen(&mut entries);
        if entries.is_empty() {
            return;
        }
        let batches = if chunk {
            batcher::partition(entries, self.max_batch)
        } else {
            vec![entries]
        };
        self.enqueue(batches);
    }

    /// Removes entries already queued or in flight, and duplicates within
    /// the list itself.
    fn filter_seen(&self, entries: &mut Vec<B::Entry>) {
        if !self.cfg.dedup_entries {
            return;
        }
        let mut seen: HashSet<B::Entry> = HashSet::new();
        for batch in self.in_flight.values() {
            seen.extend(batch.iter().cloned());
        }
        for batch in self.queue.iter() {
            seen.extend(batch.iter().cloned());
        }
        entries.retain(|entry| seen.insert(entry.clone()));
    }

    fn enqueue(&mut self, batches: Vec<Vec<B::Entry>>) {
        let rejected = self.queue.push_back(batches);
        if !rejected.is_empty() {
            let count: usize = rejected.iter().map(Vec::len).sum();
            warn!(count, "queue at capacity; dropping entries");
            self.bus
                .publish(self.event(EventKind::EntriesDropped).with_count(count));
        }
    }

    /// Restarts the initial stream when a shrunken queue has emptied.
    ///
    /// Fires only on consumption transitions; an `init` walk that finds
    /// nothing to emit does not re-trigger itself.
    fn maybe_rehydrate(&mut self) {
        if self.queue.shrunk()
            && self.queue.is_empty()
            && matches!(self.init, InitState::Complete)
        {
            debug!("queue drained after shrink; restarting initial stream");
            self.start_init();
        }
    }

    // ---------------------------
    // Shutdown
    // ---------------------------

    /// Waits for in-flight batches with the grace timeout, then abandons
    /// the rest.
    async fn drain(mut self) -> Result<(), RunnerError> {
        self.bus.publish(self.event(EventKind::ShutdownRequested));
        self.rx.close();

        let grace = self.cfg.grace;
        let mut workers = mem::replace(&mut self.workers, JoinSet::new());
        let done = time::timeout(grace, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        match done {
            Ok(()) => {
                self.bus.publish(self.event(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let pending = workers.len();
                workers.abort_all();
                warn!(pending, "shutdown grace exceeded; abandoning batches");
                self.bus
                    .publish(self.event(EventKind::GraceExceeded).with_count(pending));
                Err(RunnerError::GraceExceeded { grace, pending })
            }
        }
    }

    /// Builds an event pre-tagged with the task name and metadata label.
    fn event(&self, kind: EventKind) -> Event {
        let event = Event::now(kind).with_task(self.task.name());
        match &self.cfg.metadata {
            Some(meta) => event.with_meta(meta.clone()),
            None => event,
        }
    }
}

/// Receives the next batch from the initial stream, if one is active.
async fn next_stream_batch<T>(rx: &mut Option<mpsc::Receiver<Vec<T>>>) -> Option<Vec<T>> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
