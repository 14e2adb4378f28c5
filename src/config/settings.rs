//! Configuration settings for jobcopy
//!
//! Defines the CLI arguments, the copy configuration (loadable from a JSON
//! file) and the scheduler limits, with their defaults.

use crate::error::{Result, TransferError};
use crate::job::{WriteOptions, DEFAULT_BUFFER_SIZE};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// jobcopy - copy a directory tree with a pool of retrying workers
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "jobcopy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Copy a directory tree through a prioritized, retrying job queue")]
#[command(long_about = r#"
jobcopy turns a source tree into directory and file jobs and runs them on a
pool of worker threads. Directories are scheduled ahead of files, failed
jobs are retried, and every step is reported as a structured event.

Examples:
  jobcopy /source /destination                 # Recursive copy
  jobcopy /src /dst --threads 8 --retries 5    # Explicit pool and retry budget
  jobcopy /src /dst --pattern '*.log' -p       # Only log files, with progress
  jobcopy /src /dst --dry-run                  # Show the plan only
"#)]
pub struct CliArgs {
    /// Source directory
    #[arg(value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// Destination directory
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<PathBuf>,

    /// Number of worker threads (0 = auto-detect)
    #[arg(short = 't', long, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Attempts per job before it is dropped
    #[arg(short = 'r', long, value_name = "NUM")]
    pub retries: Option<u32>,

    /// Only copy the top level of SOURCE
    #[arg(long)]
    pub no_recursive: bool,

    /// Replace files that already exist at the destination
    #[arg(long)]
    pub overwrite: bool,

    /// Largest read/write chunk (e.g., 64K, 1M)
    #[arg(short = 'b', long, value_name = "SIZE")]
    pub buffer_size: Option<String>,

    /// Only copy files matching this glob
    #[arg(long, value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Do not copy access/modification times
    #[arg(long)]
    pub no_timestamps: bool,

    /// Do not copy permissions and extended attributes
    #[arg(long)]
    pub no_attributes: bool,

    /// Follow symbolic links while walking SOURCE
    #[arg(short = 'L', long)]
    pub follow_symlinks: bool,

    /// Load settings from a JSON file; command line flags win
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Build and print the plan without copying anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Show progress bars
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Only print errors
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

/// Worker pool and retry limits of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Worker threads spawned by `start`
    pub max_worker_count: usize,
    /// Attempts per job; 0 still runs every job once
    pub max_retry_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_worker_count: num_cpus::get(),
            max_retry_attempts: 3,
        }
    }
}

impl SchedulerConfig {
    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_worker_count == 0 {
            return Err(TransferError::config("max_worker_count must be at least 1"));
        }
        Ok(())
    }
}

/// Settings of one directory copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Source directory
    pub source: PathBuf,
    /// Destination directory
    pub destination: PathBuf,
    /// Worker threads (0 = auto-detect)
    pub threads: usize,
    /// Attempts per job
    pub retries: u32,
    /// Walk the whole tree instead of the top level
    pub recursive: bool,
    /// Replace existing files
    pub overwrite: bool,
    /// Largest chunk in bytes
    pub buffer_size: usize,
    /// Glob restricting which files are copied
    pub pattern: Option<String>,
    /// Copy access/modification times
    pub copy_timestamps: bool,
    /// Copy permissions and extended attributes
    pub copy_attributes: bool,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
    /// Create missing parents before writing
    pub parent_existence_check: bool,
    /// Plan only
    pub dry_run: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            destination: PathBuf::new(),
            threads: 0,
            retries: 3,
            recursive: true,
            overwrite: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            pattern: None,
            copy_timestamps: true,
            copy_attributes: true,
            follow_symlinks: false,
            parent_existence_check: true,
            dry_run: false,
        }
    }
}

impl CopyConfig {
    /// Config for copying `source` into `destination` with defaults
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TransferError::io(path, e))?;
        let config = serde_json::from_str(&contents).map_err(|e| {
            TransferError::config(format!("{}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Create config from CLI arguments, layered over `--config` if given
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };

        if let Some(source) = &args.source {
            config.source = source.clone();
        }
        if let Some(destination) = &args.destination {
            config.destination = destination.clone();
        }
        if let Some(threads) = args.threads {
            config.threads = threads;
        }
        if let Some(retries) = args.retries {
            config.retries = retries;
        }
        if let Some(size) = &args.buffer_size {
            let bytes = parse_size(size)
                .map_err(|e| TransferError::config(format!("Invalid buffer size: {}", e)))?;
            config.buffer_size = usize::try_from(bytes)
                .map_err(|_| TransferError::config(format!("Buffer size too large: {}", size)))?;
        }
        if args.pattern.is_some() {
            config.pattern = args.pattern.clone();
        }
        if args.no_recursive {
            config.recursive = false;
        }
        if args.overwrite {
            config.overwrite = true;
        }
        if args.no_timestamps {
            config.copy_timestamps = false;
        }
        if args.no_attributes {
            config.copy_attributes = false;
        }
        if args.follow_symlinks {
            config.follow_symlinks = true;
        }
        if args.dry_run {
            config.dry_run = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject incomplete or contradictory settings
    pub fn validate(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            return Err(TransferError::config("Source path required"));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(TransferError::config("Destination path required"));
        }
        if self.source == self.destination {
            return Err(TransferError::config(
                "Source and destination must differ",
            ));
        }
        self.scheduler_config().validate()
    }

    /// Effective worker count
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Scheduler limits for this copy
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_worker_count: self.effective_threads(),
            max_retry_attempts: self.retries,
        }
    }

    /// Write options handed to every job of this copy
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions::new()
            .overwrite(self.overwrite)
            .max_buffer_size(self.buffer_size)
            .parent_existence_check(self.parent_existence_check)
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let digits_end = size
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(size.len());
    let (num_str, suffix) = size.split_at(digits_end);

    let multiplier = match suffix.trim() {
        "" | "B" => 1u64,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        "T" | "TB" => 1024u64 * 1024 * 1024 * 1024,
        other => return Err(format!("Unknown size suffix: {}", other)),
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;

    Ok((num * multiplier as f64) as u64)
}
