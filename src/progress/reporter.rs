//! Progress reporter implementation
//!
//! An observer drawing three indicatif lines:
//! - a status spinner naming the file being copied
//! - job count progress
//! - byte progress with throughput and ETA

use crate::error::TransferError;
use crate::job::JobId;
use crate::observer::{JobEvent, JobInfo, TransferObserver, TransferProgress};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Byte accounting across concurrent, possibly retried, copies
#[derive(Default)]
struct ByteLedger {
    /// Bytes of copies that finished
    committed: u64,
    /// Cumulative bytes of copies in flight, by job
    in_flight: HashMap<JobId, u64>,
    /// Jobs whose size is already in the bar length
    sized: HashSet<JobId>,
}

impl ByteLedger {
    fn position(&self) -> u64 {
        self.committed + self.in_flight.values().sum::<u64>()
    }
}

/// Progress reporter for copy operations
pub struct ProgressReporter {
    /// Multi-progress container
    multi: MultiProgress,
    /// Job count progress bar
    jobs_bar: ProgressBar,
    /// Byte progress bar
    bytes_bar: ProgressBar,
    /// Current status message
    status: ProgressBar,
    /// Start time
    start_time: Instant,
    ledger: Mutex<ByteLedger>,
    total_jobs: AtomicU64,
    jobs_finished: AtomicU64,
    jobs_failed: AtomicU64,
    total_bytes: AtomicU64,
    /// Is progress enabled
    enabled: AtomicBool,
}

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .map(|style| style.progress_chars("=> "))
        .unwrap_or(fallback)
}

impl ProgressReporter {
    /// Create a new progress reporter drawing to stderr
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        status.enable_steady_tick(Duration::from_millis(120));

        let jobs_bar = multi.add(ProgressBar::new(0));
        jobs_bar.set_style(style(
            "{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} jobs ({percent}%)",
            ProgressStyle::default_bar(),
        ));
        jobs_bar.set_prefix("Jobs");

        let bytes_bar = multi.add(ProgressBar::new(0));
        bytes_bar.set_style(style(
            "{prefix:.bold.dim} [{bar:40.green/white}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})",
            ProgressStyle::default_bar(),
        ));
        bytes_bar.set_prefix("Data");

        Self {
            multi,
            jobs_bar,
            bytes_bar,
            status,
            start_time: Instant::now(),
            ledger: Mutex::new(ByteLedger::default()),
            total_jobs: AtomicU64::new(0),
            jobs_finished: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Create a disabled progress reporter (for quiet mode)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.enabled.store(false, Ordering::SeqCst);
        reporter.status.disable_steady_tick();
        reporter.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Set current status message
    pub fn set_status(&self, msg: &str) {
        self.status.set_message(msg.to_string());
    }

    fn set_current_file(&self, path: &std::path::Path) {
        let path = path.display().to_string();
        let chars = path.chars().count();
        let display = if chars > 60 {
            let tail: String = path.chars().skip(chars - 57).collect();
            format!("...{}", tail)
        } else {
            path
        };
        self.status.set_message(display);
    }

    fn lock_ledger(&self) -> std::sync::MutexGuard<'_, ByteLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn job_done(&self, failed: bool) {
        self.jobs_finished.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.jobs_bar.inc(1);
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get current throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let bytes = self.lock_ledger().committed;
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            bytes as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Finish progress with success message
    pub fn finish_success(&self, message: &str) {
        self.status.finish_with_message(format!("✓ {}", message));
        self.jobs_bar.finish();
        self.bytes_bar.finish();
    }

    /// Finish progress with error message
    pub fn finish_error(&self, message: &str) {
        self.status.finish_with_message(format!("✗ {}", message));
        self.jobs_bar.abandon();
        self.bytes_bar.abandon();
    }

    /// Check if progress is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Get progress summary
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            total_jobs: self.total_jobs.load(Ordering::Relaxed),
            jobs_finished: self.jobs_finished.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            bytes_copied: self.lock_ledger().committed,
            elapsed: self.elapsed(),
            throughput: self.throughput(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferObserver for ProgressReporter {
    fn on_job_enqueued(&self, _job: &JobInfo) {
        let total = self.total_jobs.fetch_add(1, Ordering::Relaxed) + 1;
        self.jobs_bar.set_length(total);
    }

    fn on_job_end(&self, _event: &JobEvent) {
        self.job_done(false);
    }

    fn on_job_retry_max_reached(&self, job: &JobInfo, error: &TransferError) {
        self.job_done(true);
        self.multi
            .suspend(|| eprintln!("failed: {} ({})", job.description, error));
    }

    fn on_file_copy_started(&self, event: &TransferProgress) {
        self.set_current_file(&event.target);
        let mut ledger = self.lock_ledger();
        if ledger.sized.insert(event.job_id) {
            let total = self.total_bytes.fetch_add(event.total_bytes, Ordering::Relaxed)
                + event.total_bytes;
            self.bytes_bar.set_length(total);
        }
        ledger.in_flight.insert(event.job_id, 0);
        self.bytes_bar.set_position(ledger.position());
    }

    fn on_file_copy_progress(&self, event: &TransferProgress) {
        let mut ledger = self.lock_ledger();
        ledger.in_flight.insert(event.job_id, event.bytes_transferred);
        self.bytes_bar.set_position(ledger.position());
    }

    fn on_file_copy_finished(&self, event: &TransferProgress) {
        let mut ledger = self.lock_ledger();
        ledger.in_flight.remove(&event.job_id);
        ledger.committed += event.bytes_transferred;
        self.bytes_bar.set_position(ledger.position());
    }

    fn on_file_copy_error(&self, event: &TransferProgress, _error: &TransferError) {
        let mut ledger = self.lock_ledger();
        ledger.in_flight.remove(&event.job_id);
        self.bytes_bar.set_position(ledger.position());
    }

    fn on_cancellation_requested(&self) {
        self.set_status("cancelling...");
    }
}

/// Progress summary
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    /// Jobs queued
    pub total_jobs: u64,
    /// Jobs that succeeded or were dropped
    pub jobs_finished: u64,
    /// Jobs dropped after their last attempt
    pub jobs_failed: u64,
    /// Bytes of all file copies started
    pub total_bytes: u64,
    /// Bytes of finished copies
    pub bytes_copied: u64,
    /// Elapsed time
    pub elapsed: Duration,
    /// Throughput in bytes/second
    pub throughput: f64,
}

impl ProgressSummary {
    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.bytes_copied as f64 / self.total_bytes as f64) * 100.0
        }
    }

    /// Print summary to console
    pub fn print(&self) {
        println!("Progress: {:.1}%", self.percentage());
        println!(
            "Jobs:     {}/{} ({} failed)",
            self.jobs_finished, self.total_jobs, self.jobs_failed
        );
        println!(
            "Bytes:    {}/{}",
            humansize::format_size(self.bytes_copied, humansize::BINARY),
            humansize::format_size(self.total_bytes, humansize::BINARY)
        );
        println!("Elapsed:  {:.1?}", self.elapsed);
        println!(
            "Speed:    {}/s",
            humansize::format_size(self.throughput as u64, humansize::BINARY)
        );
    }
}
