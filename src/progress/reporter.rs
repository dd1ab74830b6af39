//! Progress sinks
//!
//! A copy stage reports the size of every chunk it moves, followed by a
//! single `0` once the stage completes cleanly. Reports are not cumulative.
//!
//! - [`ProgressReporter`]: indicatif progress bar with rate and ETA
//! - [`ProgressCounter`]: lock-free totals for programmatic use
//! - Any `Fn(u64) + Send + Sync` closure

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receiver of per-chunk byte counts
///
/// `report` is synchronous and infallible: a sink can neither suspend nor
/// fail a transfer.
pub trait ProgressSink: Send + Sync {
    /// Record that `bytes` bytes were just moved; `0` marks stage completion
    fn report(&self, bytes: u64);
}

impl<F> ProgressSink for F
where
    F: Fn(u64) + Send + Sync,
{
    fn report(&self, bytes: u64) {
        self(bytes)
    }
}

/// Progress bar for a stream copy
///
/// Shows one byte bar (with rate and ETA from indicatif) and a status line
/// that tracks how many stages have finished.
pub struct ProgressReporter {
    multi: MultiProgress,
    bytes_bar: ProgressBar,
    status: ProgressBar,
    /// Expected length of the source, 0 when unknown
    total_bytes: AtomicU64,
    bytes_reported: AtomicU64,
    stages_finished: AtomicU64,
}

impl ProgressReporter {
    /// Create a progress bar drawn to stderr
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("Invalid template"),
        );
        status.set_message("Copying");

        let bytes_bar = multi.add(ProgressBar::new(0));
        bytes_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.green/white}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})")
                .expect("Invalid template")
                .progress_chars("=> "),
        );
        bytes_bar.set_prefix("Data ");

        Self {
            multi,
            bytes_bar,
            status,
            total_bytes: AtomicU64::new(0),
            bytes_reported: AtomicU64::new(0),
            stages_finished: AtomicU64::new(0),
        }
    }

    /// Create a reporter that counts but never draws (for quiet mode)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Set the expected source length, when known up front
    pub fn set_total_bytes(&self, total: u64) {
        self.total_bytes.store(total, Ordering::Relaxed);
        self.bytes_bar.set_length(total);
    }

    /// Sum of all reported chunk sizes
    pub fn bytes_reported(&self) -> u64 {
        self.bytes_reported.load(Ordering::Relaxed)
    }

    /// Share of the expected length reported so far, if the length is known
    pub fn percentage(&self) -> Option<f64> {
        match self.total_bytes.load(Ordering::Relaxed) {
            0 => None,
            total => Some(self.bytes_reported() as f64 / total as f64 * 100.0),
        }
    }

    /// Finish progress with success message
    pub fn finish_success(&self, message: &str) {
        self.status.finish_with_message(format!("✓ {}", message));
        self.bytes_bar.finish();
    }

    /// Finish progress with error message
    pub fn finish_error(&self, message: &str) {
        self.status.finish_with_message(format!("✗ {}", message));
        self.bytes_bar.abandon();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressReporter {
    fn report(&self, bytes: u64) {
        if bytes == 0 {
            let finished = self.stages_finished.fetch_add(1, Ordering::Relaxed) + 1;
            self.status.set_message(format!("Stage finished ({} of 2)", finished));
        } else {
            self.bytes_reported.fetch_add(bytes, Ordering::Relaxed);
            self.bytes_bar.inc(bytes);
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    bytes: AtomicU64,
    chunks: AtomicU64,
    completions: AtomicU64,
}

/// Atomic progress totals
///
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter {
    counters: Arc<Counters>,
}

impl ProgressCounter {
    /// Create a counter with all totals at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all reported byte counts
    pub fn bytes(&self) -> u64 {
        self.counters.bytes.load(Ordering::Relaxed)
    }

    /// Number of non-zero reports
    pub fn chunks(&self) -> u64 {
        self.counters.chunks.load(Ordering::Relaxed)
    }

    /// Number of stage-completion (`0`) reports
    pub fn completions(&self) -> u64 {
        self.counters.completions.load(Ordering::Relaxed)
    }
}

impl ProgressSink for ProgressCounter {
    fn report(&self, bytes: u64) {
        if bytes == 0 {
            self.counters.completions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.bytes.fetch_add(bytes, Ordering::Relaxed);
            self.counters.chunks.fetch_add(1, Ordering::Relaxed);
        }
    }
}
