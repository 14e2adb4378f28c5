//! Directory copy service
//!
//! Walks a source tree, turns every entry into a directory or file job,
//! and drives a [`JobScheduler`] until the plan has drained.

use super::scheduler::{JobScheduler, StatsSnapshot};
use crate::config::CopyConfig;
use crate::error::{Result, TransferError};
use crate::fs::{EntryType, EnumerationDepth, TreeEnumerator, TreeEntry, WalkDirEnumerator};
use crate::job::{CancellationToken, DirectoryCreationJob, FileCopyJob, Job};
use crate::observer::{NoopObserver, TransferObserver};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Jobs produced from one enumeration of the source tree
#[derive(Debug, Default)]
pub struct Plan {
    /// One job per directory, the destination root first
    pub directory_jobs: Vec<DirectoryCreationJob>,
    /// One job per file
    pub file_jobs: Vec<FileCopyJob>,
    /// Sum of the planned file sizes
    pub total_bytes: u64,
}

impl Plan {
    /// Number of jobs
    pub fn len(&self) -> usize {
        self.directory_jobs.len() + self.file_jobs.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One line per job, directories first
    pub fn describe(&self) -> Vec<String> {
        self.directory_jobs
            .iter()
            .map(|job| job.describe())
            .chain(self.file_jobs.iter().map(|job| job.describe()))
            .collect()
    }

    /// Flatten into a single batch, directories first
    pub fn into_jobs(self) -> Vec<Box<dyn Job>> {
        let mut jobs: Vec<Box<dyn Job>> = Vec::with_capacity(self.len());
        jobs.extend(
            self.directory_jobs
                .into_iter()
                .map(|job| Box::new(job) as Box<dyn Job>),
        );
        jobs.extend(
            self.file_jobs
                .into_iter()
                .map(|job| Box::new(job) as Box<dyn Job>),
        );
        jobs
    }
}

/// Result of a finished (or cancelled) copy
#[derive(Debug, Clone, Serialize)]
pub struct CopySummary {
    /// Directory jobs planned, the destination root included
    pub directories_planned: usize,
    /// File jobs planned
    pub files_planned: usize,
    /// Bytes the plan intended to copy
    pub bytes_planned: u64,
    /// Bytes of files whose copy succeeded
    pub bytes_copied: u64,
    /// Scheduler counters at the end
    pub stats: StatsSnapshot,
    /// Wall clock time of the whole operation
    pub duration: Duration,
    /// Whether the copy was cancelled
    pub cancelled: bool,
}

impl CopySummary {
    /// Every planned job succeeded
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.stats.dropped == 0 && self.stats.completed == self.stats.enqueued
    }

    /// Average throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes_copied as f64 / secs
        } else {
            0.0
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Copy Summary ===");
        println!("Directories:     {}", self.directories_planned);
        println!("Files:           {}", self.files_planned);
        println!(
            "Bytes copied:    {} of {}",
            humansize::format_size(self.bytes_copied, humansize::BINARY),
            humansize::format_size(self.bytes_planned, humansize::BINARY)
        );
        println!("Jobs completed:  {}", self.stats.completed);
        println!("Retries:         {}", self.stats.requeued);
        println!("Jobs dropped:    {}", self.stats.dropped);
        println!("Duration:        {:.2?}", self.duration);
        println!(
            "Throughput:      {}/s",
            humansize::format_size(self.throughput() as u64, humansize::BINARY)
        );
        if self.cancelled {
            println!("\nCopy was cancelled before completion");
        }
    }
}

/// Copy in flight on a service instance
struct ActiveCopy {
    token: CancellationToken,
    scheduler: Arc<JobScheduler>,
}

/// Clears the active slot when a copy ends, however it ends
struct ActiveGuard<'a> {
    slot: &'a Mutex<Option<ActiveCopy>>,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Copies a directory tree through a job scheduler
pub struct DirectoryCopyService {
    config: CopyConfig,
    observer: Arc<dyn TransferObserver>,
    enumerator: Arc<dyn TreeEnumerator>,
    active: Mutex<Option<ActiveCopy>>,
}

impl DirectoryCopyService {
    /// Create a service for `config` with the `walkdir` enumerator
    pub fn new(config: CopyConfig) -> Self {
        let enumerator = WalkDirEnumerator::new().follow_symlinks(config.follow_symlinks);
        Self {
            config,
            observer: Arc::new(NoopObserver),
            enumerator: Arc::new(enumerator),
            active: Mutex::new(None),
        }
    }

    /// Report every event to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the tree enumerator
    pub fn with_enumerator(mut self, enumerator: Arc<dyn TreeEnumerator>) -> Self {
        self.enumerator = enumerator;
        self
    }

    /// Settings of this service
    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Build the plan without running it
    pub fn plan(&self) -> Result<Plan> {
        self.build_plan(&CancellationToken::new(), None)
    }

    /// Run the copy to completion.
    ///
    /// Fails with [`TransferError::AlreadyRunning`] while another `start`
    /// on this instance is in progress. Individual job failures do not
    /// fail the call; they show up in the summary's `dropped` count.
    pub fn start(&self) -> Result<CopySummary> {
        self.config.validate()?;
        let started = Instant::now();
        let token = CancellationToken::new();
        let scheduler = Arc::new(JobScheduler::with_observer(
            self.config.scheduler_config(),
            Arc::clone(&self.observer),
        )?);

        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if active.is_some() {
                return Err(TransferError::AlreadyRunning);
            }
            *active = Some(ActiveCopy {
                token: token.clone(),
                scheduler: Arc::clone(&scheduler),
            });
        }
        let _guard = ActiveGuard { slot: &self.active };

        let copied = Arc::new(AtomicU64::new(0));
        let plan = self.build_plan(&token, Some(&copied))?;
        let directories_planned = plan.directory_jobs.len();
        let files_planned = plan.file_jobs.len();
        let bytes_planned = plan.total_bytes;
        info!(
            directories = directories_planned,
            files = files_planned,
            bytes = bytes_planned,
            "plan ready"
        );

        scheduler.add_range(plan.into_jobs())?;
        scheduler.complete_adding();
        if let Err(error) = scheduler.start() {
            scheduler.cancel();
            scheduler.wait_for_finish()?;
            return Err(error);
        }
        scheduler.wait_for_finish()?;

        let summary = CopySummary {
            directories_planned,
            files_planned,
            bytes_planned,
            bytes_copied: copied.load(Ordering::Relaxed),
            stats: scheduler.stats(),
            duration: started.elapsed(),
            cancelled: token.is_cancelled() || scheduler.is_cancelled(),
        };
        info!(
            completed = summary.stats.completed,
            dropped = summary.stats.dropped,
            cancelled = summary.cancelled,
            "copy finished"
        );
        Ok(summary)
    }

    /// Cancel the running copy, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(copy) => {
                copy.token.cancel();
                copy.scheduler.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a copy is in progress
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn build_plan(&self, token: &CancellationToken, copied: Option<&Arc<AtomicU64>>) -> Result<Plan> {
        let source = &self.config.source;
        if !source.is_dir() {
            return Err(if source.exists() {
                TransferError::InvalidPath(format!("{} is not a directory", source.display()))
            } else {
                TransferError::NotFound(source.clone())
            });
        }

        let mut plan = Plan::default();
        plan.directory_jobs
            .push(self.directory_job(self.config.destination.clone(), token));

        let entries = self.enumerator.enumerate(
            source,
            self.config.pattern.as_deref(),
            EnumerationDepth::from_recursive(self.config.recursive),
        )?;

        for entry in entries {
            if token.is_cancelled() {
                debug!("planning cancelled");
                break;
            }
            let entry = entry?;
            let target = self.map_to_target(&entry.path)?;
            match entry.entry_type {
                EntryType::Directory => {
                    plan.directory_jobs.push(self.directory_job(target, token));
                }
                EntryType::File => {
                    plan.total_bytes += entry.size;
                    plan.file_jobs.push(self.file_job(&entry, target, token, copied));
                }
                EntryType::Symlink | EntryType::Other => {
                    return Err(TransferError::UnsupportedEntryType {
                        path: entry.path,
                        entry_type: entry.entry_type.to_string(),
                    });
                }
            }
        }

        debug!(jobs = plan.len(), "enumeration complete");
        Ok(plan)
    }

    fn map_to_target(&self, path: &Path) -> Result<PathBuf> {
        let relative = path.strip_prefix(&self.config.source).map_err(|_| {
            TransferError::InvalidPath(format!(
                "{} is outside {}",
                path.display(),
                self.config.source.display()
            ))
        })?;
        Ok(self.config.destination.join(relative))
    }

    fn directory_job(&self, target: PathBuf, token: &CancellationToken) -> DirectoryCreationJob {
        DirectoryCreationJob::new(target)
            .with_options(self.config.write_options())
            .with_cancellation(token.clone())
    }

    fn file_job(
        &self,
        entry: &TreeEntry,
        target: PathBuf,
        token: &CancellationToken,
        copied: Option<&Arc<AtomicU64>>,
    ) -> FileCopyJob {
        let mut job = FileCopyJob::new(&entry.path, target)
            .with_options(self.config.write_options())
            .copy_timestamps(self.config.copy_timestamps)
            .copy_attributes(self.config.copy_attributes)
            .with_cancellation(token.clone());

        if let Some(copied) = copied {
            let copied = Arc::clone(copied);
            let size = entry.size;
            job.core_mut().handlers_mut().on_end(move |_| {
                copied.fetch_add(size, Ordering::Relaxed);
            });
        }
        job
    }
}

impl std::fmt::Debug for DirectoryCopyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryCopyService")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}
