use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Events emitted by [`super::ExecutionEngine`] while it runs chunk tasks.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// A run over `chunks` tasks begins; `run_id` increases by one per run on an engine.
    RunStarted { run_id: u64, chunks: usize },
    /// A chunk waited for an in-flight permit before starting.
    ThrottleWaited { chunk_index: usize, duration: Duration },
    ChunkStarted { chunk_index: usize },
    /// `failed` is set when the chunk returned an error; such chunks report 0 rows.
    ChunkFinished {
        chunk_index: usize,
        output_rows: usize,
        failed: bool,
    },
    RunFinished { metrics: ExecutionMetricsSnapshot },
}

/// Observer hook for execution events. Called from worker threads.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Logs run boundaries and failed chunks to stderr.
#[derive(Debug, Default)]
pub struct StdErrExecutionObserver;

impl ExecutionObserver for StdErrExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted { run_id, chunks } => {
                eprintln!("[exec][run {run_id}] start chunks={chunks}");
            }
            ExecutionEvent::ChunkFinished {
                chunk_index,
                failed: true,
                ..
            } => eprintln!("[exec] chunk {chunk_index} failed"),
            ExecutionEvent::RunFinished { metrics } => eprintln!("[exec] done {metrics}"),
            _ => {}
        }
    }
}

/// Live counters for the current run of an engine.
///
/// Counters reset when a run starts and are updated from worker threads; a
/// [`snapshot`](Self::snapshot) can be taken at any time.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,
    rows_produced: AtomicU64,
    chunks_started: AtomicU64,
    chunks_finished: AtomicU64,
    chunks_failed: AtomicU64,
    throttle_wait_ns: AtomicU64,
    active_chunks: AtomicUsize,
    max_active_chunks: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every counter and return the new run id.
    pub(super) fn begin_run(&self) -> u64 {
        for counter in [
            &self.elapsed_ns,
            &self.rows_produced,
            &self.chunks_started,
            &self.chunks_finished,
            &self.chunks_failed,
            &self.throttle_wait_ns,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
        self.active_chunks.store(0, Ordering::SeqCst);
        self.max_active_chunks.store(0, Ordering::SeqCst);
        self.run_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(super) fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(saturating_nanos(elapsed), Ordering::SeqCst);
    }

    pub(super) fn chunk_started(&self) {
        self.chunks_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
    }

    pub(super) fn chunk_finished(&self, rows: usize, failed: bool) {
        self.rows_produced.fetch_add(rows as u64, Ordering::SeqCst);
        self.chunks_finished.fetch_add(1, Ordering::SeqCst);
        if failed {
            self.chunks_failed.fetch_add(1, Ordering::SeqCst);
        }
        self.active_chunks.fetch_sub(1, Ordering::SeqCst);
    }

    pub(super) fn throttled(&self, d: Duration) {
        self.throttle_wait_ns
            .fetch_add(saturating_nanos(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed: (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns)),
            rows_produced: self.rows_produced.load(Ordering::SeqCst),
            chunks_started: self.chunks_started.load(Ordering::SeqCst),
            chunks_finished: self.chunks_finished.load(Ordering::SeqCst),
            chunks_failed: self.chunks_failed.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_chunks: self.max_active_chunks.load(Ordering::SeqCst),
        }
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Point-in-time copy of [`ExecutionMetrics`]. `elapsed` is `None` while a run is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub rows_produced: u64,
    pub chunks_started: u64,
    pub chunks_finished: u64,
    pub chunks_failed: u64,
    pub throttle_wait: Duration,
    pub max_active_chunks: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run={} rows={} chunks={}/{} failed={} peak_active={} throttled={:?}",
            self.run_id,
            self.rows_produced,
            self.chunks_finished,
            self.chunks_started,
            self.chunks_failed,
            self.max_active_chunks,
            self.throttle_wait,
        )?;
        if let Some(elapsed) = self.elapsed {
            write!(f, " elapsed={elapsed:?}")?;
        }
        Ok(())
    }
}
