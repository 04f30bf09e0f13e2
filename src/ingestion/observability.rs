//! Read outcome reporting.
//!
//! [`super::read_path`] reports every attempt to the [`IngestionObserver`] configured in
//! [`super::IngestionOptions`]. I/O failures are [`IngestionSeverity::Critical`]; every other
//! failure is [`IngestionSeverity::Error`].

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::FrameError;

use super::unified::FileFormat;

/// Severity of a read outcome, ordered for alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    Info,
    Warning,
    Error,
    /// I/O and other infrastructure failures.
    Critical,
}

/// Which file was read and how it was decoded.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    pub path: PathBuf,
    pub format: FileFormat,
}

/// Outcome of a successful read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    pub rows: usize,
    pub columns: usize,
    /// Size of the input file.
    pub bytes: u64,
    /// Wall time from opening the file to the finished DataFrame.
    pub elapsed: Duration,
}

/// Receives read outcomes. Every method defaults to doing nothing, except
/// [`on_alert`](Self::on_alert), which forwards to [`on_failure`](Self::on_failure).
pub trait IngestionObserver: Send + Sync {
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &FrameError) {}

    /// Called after `on_failure` when the severity reaches the configured threshold.
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &FrameError) {
        self.on_failure(ctx, severity, error)
    }
}

/// One reportable outcome, rendered as a single `key=value` log line.
enum Outcome<'a> {
    Ok(IngestionStats),
    Fail(IngestionSeverity, &'a FrameError),
    Alert(IngestionSeverity, &'a FrameError),
}

struct Line<'a>(&'a IngestionContext, Outcome<'a>);

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Line(ctx, outcome) = self;
        let target = format!("format={} path={}", ctx.format, ctx.path.display());
        match outcome {
            Outcome::Ok(s) => write!(
                f,
                "ok {target} rows={} columns={} bytes={} elapsed_ms={}",
                s.rows,
                s.columns,
                s.bytes,
                s.elapsed.as_millis()
            ),
            Outcome::Fail(sev, err) => write!(f, "fail severity={sev:?} {target} err={err}"),
            Outcome::Alert(sev, err) => write!(f, "ALERT severity={sev:?} {target} err={err}"),
        }
    }
}

/// Forwards every callback to each inner observer, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.observers.iter().for_each(|o| o.on_success(ctx, stats));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &FrameError) {
        self.observers
            .iter()
            .for_each(|o| o.on_failure(ctx, severity, error));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &FrameError) {
        self.observers
            .iter()
            .for_each(|o| o.on_alert(ctx, severity, error));
    }
}

/// Prints one `[read]` line per outcome to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl IngestionObserver for StdErrObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        eprintln!("[read] {}", Line(ctx, Outcome::Ok(stats)));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &FrameError) {
        eprintln!("[read] {}", Line(ctx, Outcome::Fail(severity, error)));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &FrameError) {
        eprintln!("[read] {}", Line(ctx, Outcome::Alert(severity, error)));
    }
}

/// Appends one timestamped line per outcome to a log file.
///
/// Logging is best-effort: a log file that cannot be opened or written is ignored and never
/// affects the read itself.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append(&self, line: Line<'_>) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{ts} {line}");
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append(Line(ctx, Outcome::Ok(stats)));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &FrameError) {
        self.append(Line(ctx, Outcome::Fail(severity, error)));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &FrameError) {
        self.append(Line(ctx, Outcome::Alert(severity, error)));
    }
}
