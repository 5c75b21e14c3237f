use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use batchvisor::{
    BatchError, BatchTask, Config, DebugCount, EntryStream, Runner, RunnerError, RunnerHandle,
    TaskError,
};

const ADMISSION: Duration = Duration::from_secs(1);

async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within deadline");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_idle(handle: &RunnerHandle<String>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let count = handle.debug_count().await.unwrap();
        if count == (DebugCount { buffer: 0, tasks: 0 }) {
            return;
        }
        assert!(Instant::now() < deadline, "runner did not drain within deadline");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn entries(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Emits a fixed corpus and records every batch handed to `run`.
struct SeedTask {
    seed: Vec<String>,
    runs: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl BatchTask for SeedTask {
    type Entry = String;

    fn name(&self) -> &str {
        "seed"
    }

    async fn init(&self, stream: &mut EntryStream<String>) -> Result<(), TaskError> {
        for entry in &self.seed {
            stream.emit(entry.clone()).await?;
        }
        Ok(())
    }

    async fn run(&self, batch: Vec<String>) -> Result<(), BatchError<String>> {
        self.runs.lock().unwrap().push(batch);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn initial_stream_is_dispatched_in_walk_order() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut cfg = Config::default();
    cfg.max_batch_size = 3;
    cfg.max_concurrent = 1;

    let runner = Runner::start(
        cfg,
        SeedTask {
            seed: entries(&["a", "b", "c", "d", "e"]),
            runs: Arc::clone(&runs),
        },
    );

    wait_for(|| runs.lock().unwrap().len() == 2).await;
    wait_for_idle(&runner.handle()).await;

    assert_eq!(
        *runs.lock().unwrap(),
        vec![entries(&["a", "b", "c"]), entries(&["d", "e"])],
    );
    runner.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_buffer_call_is_accepted() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let runner = Runner::start(
        Config::default(),
        SeedTask {
            seed: Vec::new(),
            runs,
        },
    );

    runner.handle().buffer(Vec::new(), ADMISSION).await.unwrap();
    runner.shutdown().await.unwrap();
}

/// Fails the first `failures` run calls with the given retry signal.
struct FlakyTask {
    seed: Vec<String>,
    attempts: AtomicUsize,
    failures: usize,
    replacement: Option<Vec<String>>,
    runs: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl BatchTask for FlakyTask {
    type Entry = String;

    fn name(&self) -> &str {
        "flaky"
    }

    async fn init(&self, stream: &mut EntryStream<String>) -> Result<(), TaskError> {
        for entry in &self.seed {
            stream.emit(entry.clone()).await?;
        }
        Ok(())
    }

    async fn run(&self, batch: Vec<String>) -> Result<(), BatchError<String>> {
        self.runs.lock().unwrap().push(batch);
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return match &self.replacement {
                Some(replacement) => Err(BatchError::RetryWith(replacement.clone())),
                None => Err(BatchError::Retry),
            };
        }
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn retry_requeues_the_same_batch() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut cfg = Config::default();
    cfg.max_batch_size = 3;
    cfg.max_concurrent = 1;

    let runner = Runner::start(
        cfg,
        FlakyTask {
            seed: entries(&["a"]),
            attempts: AtomicUsize::new(0),
            failures: 1,
            replacement: None,
            runs: Arc::clone(&runs),
        },
    );

    wait_for(|| runs.lock().unwrap().len() == 2).await;
    wait_for_idle(&runner.handle()).await;

    assert_eq!(
        *runs.lock().unwrap(),
        vec![entries(&["a"]), entries(&["a"])],
    );
    runner.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn retry_with_replacement_requeues_the_new_entries() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut cfg = Config::default();
    cfg.max_concurrent = 1;

    let runner = Runner::start(
        cfg,
        FlakyTask {
            seed: entries(&["x"]),
            attempts: AtomicUsize::new(0),
            failures: 1,
            replacement: Some(entries(&["y", "z"])),
            runs: Arc::clone(&runs),
        },
    );

    wait_for(|| runs.lock().unwrap().len() == 2).await;
    wait_for_idle(&runner.handle()).await;

    assert_eq!(
        *runs.lock().unwrap(),
        vec![entries(&["x"]), entries(&["y", "z"])],
    );
    runner.shutdown().await.unwrap();
}

/// Panics on the first run call, recording every batch beforehand.
struct CrashingTask {
    attempts: AtomicUsize,
    runs: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl BatchTask for CrashingTask {
    type Entry = String;

    fn name(&self) -> &str {
        "crashing"
    }

    async fn init(&self, stream: &mut EntryStream<String>) -> Result<(), TaskError> {
        stream.emit("a".to_string()).await
    }

    async fn run(&self, batch: Vec<String>) -> Result<(), BatchError<String>> {
        self.runs.lock().unwrap().push(batch);
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("worker crash");
        }
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_crash_requeues_the_original_batch() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut cfg = Config::default();
    cfg.max_concurrent = 1;

    let runner = Runner::start(
        cfg,
        CrashingTask {
            attempts: AtomicUsize::new(0),
            runs: Arc::clone(&runs),
        },
    );

    wait_for(|| runs.lock().unwrap().len() == 2).await;
    wait_for_idle(&runner.handle()).await;

    assert_eq!(
        *runs.lock().unwrap(),
        vec![entries(&["a"]), entries(&["a"])],
    );
    runner.shutdown().await.unwrap();
}

/// Tracks how many run calls overlap.
struct GaugeTask {
    seed: Vec<String>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

#[async_trait]
impl BatchTask for GaugeTask {
    type Entry = String;

    fn name(&self) -> &str {
        "gauge"
    }

    async fn init(&self, stream: &mut EntryStream<String>) -> Result<(), TaskError> {
        for entry in &self.seed {
            stream.emit(entry.clone()).await?;
        }
        Ok(())
    }

    async fn run(&self, _batch: Vec<String>) -> Result<(), BatchError<String>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrency_never_exceeds_the_configured_limit() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));

    let mut cfg = Config::default();
    cfg.max_batch_size = 1;
    cfg.max_concurrent = 2;

    let runner = Runner::start(
        cfg,
        GaugeTask {
            seed: entries(&["a", "b", "c", "d"]),
            active: Arc::clone(&active),
            peak: Arc::clone(&peak),
            total: Arc::clone(&total),
        },
    );

    wait_for(|| total.load(Ordering::SeqCst) == 4).await;

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    runner.shutdown().await.unwrap();
}

/// Records batches; the first run call parks until released.
struct ParkedTask {
    seed: Vec<String>,
    parked: AtomicUsize,
    release: Arc<Notify>,
    runs: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl BatchTask for ParkedTask {
    type Entry = String;

    fn name(&self) -> &str {
        "parked"
    }

    async fn init(&self, stream: &mut EntryStream<String>) -> Result<(), TaskError> {
        for entry in &self.seed {
            stream.emit(entry.clone()).await?;
        }
        Ok(())
    }

    async fn run(&self, batch: Vec<String>) -> Result<(), BatchError<String>> {
        self.runs.lock().unwrap().push(batch);
        if self.parked.fetch_add(1, Ordering::SeqCst) == 0 {
            self.release.notified().await;
        }
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn dedup_drops_buffered_duplicates() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut cfg = Config::default();
    cfg.max_batch_size = 10;
    cfg.max_concurrent = 1;
    cfg.dedup_entries = true;
    cfg.flush_interval = Duration::from_millis(100);

    let runner = Runner::start(
        cfg,
        SeedTask {
            seed: Vec::new(),
            runs: Arc::clone(&runs),
        },
    );
    let handle = runner.handle();

    handle.buffer(entries(&["a", "b"]), ADMISSION).await.unwrap();
    handle.buffer(entries(&["b", "c"]), ADMISSION).await.unwrap();

    wait_for(|| !runs.lock().unwrap().is_empty()).await;
    wait_for_idle(&handle).await;

    let mut flattened: Vec<String> = runs.lock().unwrap().concat();
    flattened.sort();
    assert_eq!(flattened, entries(&["a", "b", "c"]));
    runner.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn dedup_drops_entries_already_in_flight() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let release = Arc::new(Notify::new());
    let mut cfg = Config::default();
    cfg.max_batch_size = 10;
    cfg.max_concurrent = 1;
    cfg.dedup_entries = true;
    cfg.flush_interval = Duration::from_millis(50);

    let runner = Runner::start(
        cfg,
        ParkedTask {
            seed: entries(&["a"]),
            parked: AtomicUsize::new(0),
            release: Arc::clone(&release),
            runs: Arc::clone(&runs),
        },
    );
    let handle = runner.handle();

    // The first worker is parked holding ["a"].
    wait_for(|| runs.lock().unwrap().len() == 1).await;

    handle.buffer(entries(&["a", "x"]), ADMISSION).await.unwrap();
    // Let the buffer flush while "a" is still executing.
    tokio::time::sleep(Duration::from_millis(250)).await;
    release.notify_waiters();

    wait_for(|| runs.lock().unwrap().len() == 2).await;
    wait_for_idle(&handle).await;

    assert_eq!(
        *runs.lock().unwrap(),
        vec![entries(&["a"]), entries(&["x"])],
    );
    runner.shutdown().await.unwrap();
}

/// Counts init walks; only the first emits anything.
struct PollingTask {
    init_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl BatchTask for PollingTask {
    type Entry = String;

    fn name(&self) -> &str {
        "polling"
    }

    async fn init(&self, stream: &mut EntryStream<String>) -> Result<(), TaskError> {
        if self.init_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            stream.emit("a".to_string()).await?;
        }
        Ok(())
    }

    async fn run(&self, _batch: Vec<String>) -> Result<(), BatchError<String>> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn poll_mode_reruns_the_initial_stream_when_idle() {
    let init_calls = Arc::new(AtomicUsize::new(0));
    let mut cfg = Config::default();
    cfg.poll = true;
    cfg.poll_interval = Duration::from_millis(50);
    cfg.flush_interval = Duration::from_millis(25);

    let runner = Runner::start(
        cfg,
        PollingTask {
            init_calls: Arc::clone(&init_calls),
        },
    );

    wait_for(|| init_calls.load(Ordering::SeqCst) >= 2).await;
    runner.shutdown().await.unwrap();
}

/// A run call that never returns.
struct StuckTask {
    runs: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl BatchTask for StuckTask {
    type Entry = String;

    fn name(&self) -> &str {
        "stuck"
    }

    async fn init(&self, stream: &mut EntryStream<String>) -> Result<(), TaskError> {
        stream.emit("a".to_string()).await
    }

    async fn run(&self, batch: Vec<String>) -> Result<(), BatchError<String>> {
        self.runs.lock().unwrap().push(batch);
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_abandons_stuck_workers_after_grace() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let mut cfg = Config::default();
    cfg.grace = Duration::from_millis(100);

    let runner = Runner::start(
        cfg,
        StuckTask {
            runs: Arc::clone(&runs),
        },
    );

    wait_for(|| runs.lock().unwrap().len() == 1).await;

    match runner.shutdown().await {
        Err(RunnerError::GraceExceeded { pending, .. }) => assert_eq!(pending, 1),
        other => panic!("expected GraceExceeded, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn handle_is_closed_after_shutdown() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let runner = Runner::start(
        Config::default(),
        SeedTask {
            seed: Vec::new(),
            runs,
        },
    );
    let handle = runner.handle();
    runner.shutdown().await.unwrap();

    let result = handle.buffer(entries(&["late"]), ADMISSION).await;
    assert!(matches!(result, Err(RunnerError::Closed)));
}
