//! Event payloads delivered to observers

use crate::job::{JobId, JobKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Snapshot of a job at the moment an event fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    /// Scheduler assigned id
    pub id: JobId,
    /// Job kind
    pub kind: JobKind,
    /// Priority at the time of the event
    pub priority: i32,
    /// Dispatches so far
    pub retry_count: u32,
    /// One-line description
    pub description: String,
}

/// Job lifecycle event (run, end, error)
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    /// The job
    pub job: JobInfo,
    /// When this attempt started
    pub started: DateTime<Utc>,
    /// When this attempt ended, for end and error events
    pub finished: Option<DateTime<Utc>>,
}

impl JobEvent {
    pub(crate) fn started(job: JobInfo, started: DateTime<Utc>) -> Self {
        Self {
            job,
            started,
            finished: None,
        }
    }

    pub(crate) fn finished(job: JobInfo, started: DateTime<Utc>, finished: DateTime<Utc>) -> Self {
        Self {
            job,
            started,
            finished: Some(finished),
        }
    }

    /// Duration of the attempt, once finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished.map(|finished| finished - self.started)
    }
}

/// Directory creation event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEvent {
    /// Owning job
    pub job_id: JobId,
    /// Directory being created
    pub path: PathBuf,
    /// Whether the directory was actually created (false if it existed)
    pub created: bool,
}

/// File copy / creation event: started, progress, finished, error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferProgress {
    /// Owning job
    pub job_id: JobId,
    /// Source file, `None` for in-memory payloads
    pub source: Option<PathBuf>,
    /// Target file
    pub target: PathBuf,
    /// Bytes expected
    pub total_bytes: u64,
    /// Bytes written so far
    pub bytes_transferred: u64,
    /// Time since the transfer started
    pub elapsed: Duration,
}

impl TransferProgress {
    /// Throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_transferred as f64 / secs
        } else {
            0.0
        }
    }

    /// Completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_transferred as f64 / self.total_bytes as f64) * 100.0
        }
    }
}

/// Identifier of a worker thread
pub type WorkerId = u64;

/// Worker lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerEvent {
    /// Worker id, unique per scheduler
    pub worker_id: WorkerId,
    /// OS thread name
    pub thread_name: String,
}

/// Why a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownReason {
    /// The scheduler was cancelled
    Cancelled,
    /// The worker consumed a removal credit
    Removed,
    /// Queue empty and adding completed
    Drained,
}
