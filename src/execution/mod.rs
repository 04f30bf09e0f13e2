//! Bounded parallel execution of index-addressed chunk tasks.
//!
//! The engine owns a rayon thread pool sized to the available parallelism (or a configured
//! thread count). [`ExecutionEngine::run_chunks`] runs one task per chunk index and returns
//! the results in chunk order: every task writes to its own slot of the output vector, so
//! there is no shared mutable state and the merge step is a plain in-order walk.
//!
//! `max_in_flight_chunks` caps how many tasks run at once. Each run resets the live
//! [`ExecutionMetrics`] and reports [`ExecutionEvent`]s to the configured observer.

mod observer;
mod semaphore;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

use crate::error::{FrameError, FrameResult};

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver,
    StdErrExecutionObserver,
};

use semaphore::Semaphore;

/// Number of hardware threads, falling back to 1 when it cannot be determined.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Configuration for the [`ExecutionEngine`].
#[derive(Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on concurrently executing chunks, on top of `num_threads`.
    pub max_in_flight_chunks: usize,
    /// Receives [`ExecutionEvent`]s for every run of engines built from these options.
    pub observer: Option<Arc<dyn ExecutionObserver>>,
}

impl fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("num_threads", &self.num_threads)
            .field("max_in_flight_chunks", &self.max_in_flight_chunks)
            .field("observer", &self.observer.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = available_parallelism();
        Self {
            num_threads: Some(n),
            max_in_flight_chunks: n.max(1),
            observer: None,
        }
    }
}

/// What a chunk task reports back to the engine's metrics.
pub trait ChunkOutput {
    /// Rows produced by the chunk.
    fn output_rows(&self) -> usize;

    fn failed(&self) -> bool {
        false
    }
}

impl<T: ChunkOutput, E> ChunkOutput for Result<T, E> {
    fn output_rows(&self) -> usize {
        self.as_ref().map_or(0, ChunkOutput::output_rows)
    }

    fn failed(&self) -> bool {
        self.is_err()
    }
}

/// A configurable engine running chunk tasks on a dedicated thread pool.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// Fails if `max_in_flight_chunks == 0`, `num_threads == Some(0)`, or the thread pool
    /// cannot be created.
    pub fn new(opts: ExecutionOptions) -> FrameResult<Self> {
        if opts.max_in_flight_chunks == 0 {
            return Err(FrameError::schema("max_in_flight_chunks must be > 0"));
        }
        if opts.num_threads == Some(0) {
            return Err(FrameError::schema("num_threads must be > 0 when set"));
        }

        let n_threads = opts
            .num_threads
            .unwrap_or_else(available_parallelism)
            .max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|e| std::io::Error::other(format!("failed to build thread pool: {e}")))?;

        Ok(Self {
            pool,
            observer: opts.observer.clone(),
            opts,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer, replacing the one from the options.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of worker threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task(i)` for every chunk index `i in 0..chunks` and return the results indexed
    /// by chunk (not by completion order).
    ///
    /// Blocks until every task has finished.
    pub fn run_chunks<T, F>(&self, chunks: usize, task: F) -> Vec<T>
    where
        T: ChunkOutput + Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        self.pool.install(|| self.run_chunks_impl(chunks, &task))
    }

    fn run_chunks_impl<T>(&self, chunks: usize, task: &(dyn Fn(usize) -> T + Send + Sync)) -> Vec<T>
    where
        T: ChunkOutput + Send,
    {
        let start = Instant::now();
        let run_id = self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted { run_id, chunks });

        let sem = Semaphore::new(self.opts.max_in_flight_chunks);

        let slots: Vec<T> = (0..chunks)
            .into_par_iter()
            .map(|chunk_index| {
                let permit = sem.acquire();
                if permit.waited() > Duration::ZERO {
                    self.metrics.throttled(permit.waited());
                    self.emit(ExecutionEvent::ThrottleWaited {
                        chunk_index,
                        duration: permit.waited(),
                    });
                }

                self.metrics.chunk_started();
                self.emit(ExecutionEvent::ChunkStarted { chunk_index });

                let out = task(chunk_index);
                let (output_rows, failed) = (out.output_rows(), out.failed());

                self.metrics.chunk_finished(output_rows, failed);
                self.emit(ExecutionEvent::ChunkFinished {
                    chunk_index,
                    output_rows,
                    failed,
                });
                out
            })
            .collect();

        self.metrics.end_run(start.elapsed());
        self.emit(ExecutionEvent::RunFinished {
            metrics: self.metrics.snapshot(),
        });

        slots
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}
