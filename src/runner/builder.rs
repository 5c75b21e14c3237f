//! # Builder for constructing and starting a runner.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::events::Bus;
use crate::monitor::MemoryMonitor;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::task::BatchTask;

use super::core::Core;
use super::handle::RunnerHandle;
use super::Runner;

/// Builder for a [`Runner`] with optional observability and memory-monitor
/// wiring.
pub struct RunnerBuilder<B: BatchTask> {
    cfg: Config,
    task: B,
    subscribers: Vec<Arc<dyn Subscribe>>,
    monitor: Option<Arc<dyn MemoryMonitor>>,
}

impl<B: BatchTask> RunnerBuilder<B> {
    /// Creates a new builder with the given configuration and callback.
    pub fn new(cfg: Config, task: B) -> Self {
        Self {
            cfg,
            task,
            subscribers: Vec::new(),
            monitor: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (batch lifecycle, drops, shrinks)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Registers the runner with a memory monitor at start.
    ///
    /// Without a monitor, shrinking only happens through explicit
    /// [`RunnerHandle::shrink`] calls.
    pub fn with_memory_monitor(mut self, monitor: Arc<dyn MemoryMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Starts the owner loop and returns the running facade.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Runner<B> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        SubscriberSet::new(self.subscribers).listen(&bus);

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.cfg.mailbox_capacity_clamped());
        let handle = RunnerHandle::new(tx.clone(), token.clone());

        if let Some(monitor) = self.monitor {
            monitor.register_shrinkable(Arc::new(handle.clone()));
        }

        let core = Core::new(self.cfg, Arc::new(self.task), bus, rx, tx, token.clone());
        let join = tokio::spawn(core.run());

        Runner::new(handle, token, join)
    }
}
