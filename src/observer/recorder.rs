//! In-memory event timeline
//!
//! `EventRecorder` keeps every event in arrival order, which makes the
//! engine's behaviour inspectable after the fact.

use super::{
    DirectoryEvent, JobEvent, JobInfo, ShutdownReason, TransferObserver, TransferProgress,
    WorkerEvent, WorkerId,
};
use crate::error::TransferError;
use crate::job::{JobId, JobKind};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// A recorded event with the fields worth asserting on
///
/// One variant per observer callback, named after it.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    DirectoryCreating { path: PathBuf },
    DirectoryCreated { path: PathBuf, created: bool },
    DirectoryError { path: PathBuf, error: String },
    FileCopyStarted { target: PathBuf, total_bytes: u64 },
    FileCopyProgress { target: PathBuf, bytes: u64 },
    FileCopyFinished { target: PathBuf, bytes: u64 },
    FileCopyError { target: PathBuf, error: String },
    FileCreationStarted { target: PathBuf, total_bytes: u64 },
    FileCreationProgress { target: PathBuf, bytes: u64 },
    FileCreationFinished { target: PathBuf, bytes: u64 },
    FileCreationError { target: PathBuf, error: String },
    WorkerCreated { worker: WorkerId },
    WorkerStarted { worker: WorkerId },
    WorkerWaiting { worker: WorkerId },
    WorkerWokeUp { worker: WorkerId },
    WorkerPickedJob { worker: WorkerId, job: JobId },
    WorkerShutdown { worker: WorkerId, reason: ShutdownReason },
    JobRun { job: JobId, kind: JobKind, attempt: u32 },
    JobError { job: JobId, kind: JobKind, error: String },
    JobEnd { job: JobId, kind: JobKind },
    JobEnqueued { job: JobId, priority: i32 },
    JobDequeued { job: JobId, priority: i32 },
    JobRequeued { job: JobId },
    JobRetryMaxReached { job: JobId, error: String },
    CompletedAddingRequested,
    CancellationRequested,
}

/// Observer recording every event
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl EventRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: RecordedEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Copy of the timeline so far
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&RecordedEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| predicate(event))
            .count()
    }

    /// Position of the first event matching a predicate
    pub fn position(&self, predicate: impl Fn(&RecordedEvent) -> bool) -> Option<usize> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .position(predicate)
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl TransferObserver for EventRecorder {
    fn on_directory_creating(&self, event: &DirectoryEvent) {
        self.push(RecordedEvent::DirectoryCreating {
            path: event.path.clone(),
        });
    }

    fn on_directory_created(&self, event: &DirectoryEvent) {
        self.push(RecordedEvent::DirectoryCreated {
            path: event.path.clone(),
            created: event.created,
        });
    }

    fn on_directory_error(&self, event: &DirectoryEvent, error: &TransferError) {
        self.push(RecordedEvent::DirectoryError {
            path: event.path.clone(),
            error: error.to_string(),
        });
    }

    fn on_file_copy_started(&self, event: &TransferProgress) {
        self.push(RecordedEvent::FileCopyStarted {
            target: event.target.clone(),
            total_bytes: event.total_bytes,
        });
    }

    fn on_file_copy_progress(&self, event: &TransferProgress) {
        self.push(RecordedEvent::FileCopyProgress {
            target: event.target.clone(),
            bytes: event.bytes_transferred,
        });
    }

    fn on_file_copy_finished(&self, event: &TransferProgress) {
        self.push(RecordedEvent::FileCopyFinished {
            target: event.target.clone(),
            bytes: event.bytes_transferred,
        });
    }

    fn on_file_copy_error(&self, event: &TransferProgress, error: &TransferError) {
        self.push(RecordedEvent::FileCopyError {
            target: event.target.clone(),
            error: error.to_string(),
        });
    }

    fn on_file_creation_started(&self, event: &TransferProgress) {
        self.push(RecordedEvent::FileCreationStarted {
            target: event.target.clone(),
            total_bytes: event.total_bytes,
        });
    }

    fn on_file_creation_progress(&self, event: &TransferProgress) {
        self.push(RecordedEvent::FileCreationProgress {
            target: event.target.clone(),
            bytes: event.bytes_transferred,
        });
    }

    fn on_file_creation_finished(&self, event: &TransferProgress) {
        self.push(RecordedEvent::FileCreationFinished {
            target: event.target.clone(),
            bytes: event.bytes_transferred,
        });
    }

    fn on_file_creation_error(&self, event: &TransferProgress, error: &TransferError) {
        self.push(RecordedEvent::FileCreationError {
            target: event.target.clone(),
            error: error.to_string(),
        });
    }

    fn on_worker_created(&self, worker: &WorkerEvent) {
        self.push(RecordedEvent::WorkerCreated {
            worker: worker.worker_id,
        });
    }

    fn on_worker_started(&self, worker: &WorkerEvent) {
        self.push(RecordedEvent::WorkerStarted {
            worker: worker.worker_id,
        });
    }

    fn on_worker_waiting(&self, worker: &WorkerEvent) {
        self.push(RecordedEvent::WorkerWaiting {
            worker: worker.worker_id,
        });
    }

    fn on_worker_woke_up(&self, worker: &WorkerEvent) {
        self.push(RecordedEvent::WorkerWokeUp {
            worker: worker.worker_id,
        });
    }

    fn on_worker_picked_job(&self, worker: &WorkerEvent, job: &JobInfo) {
        self.push(RecordedEvent::WorkerPickedJob {
            worker: worker.worker_id,
            job: job.id,
        });
    }

    fn on_worker_shutdown(&self, worker: &WorkerEvent, reason: ShutdownReason) {
        self.push(RecordedEvent::WorkerShutdown {
            worker: worker.worker_id,
            reason,
        });
    }

    fn on_job_run(&self, event: &JobEvent) {
        self.push(RecordedEvent::JobRun {
            job: event.job.id,
            kind: event.job.kind,
            attempt: event.job.retry_count,
        });
    }

    fn on_job_error(&self, event: &JobEvent, error: &TransferError) {
        self.push(RecordedEvent::JobError {
            job: event.job.id,
            kind: event.job.kind,
            error: error.to_string(),
        });
    }

    fn on_job_end(&self, event: &JobEvent) {
        self.push(RecordedEvent::JobEnd {
            job: event.job.id,
            kind: event.job.kind,
        });
    }

    fn on_job_enqueued(&self, job: &JobInfo) {
        self.push(RecordedEvent::JobEnqueued {
            job: job.id,
            priority: job.priority,
        });
    }

    fn on_job_dequeued(&self, job: &JobInfo) {
        self.push(RecordedEvent::JobDequeued {
            job: job.id,
            priority: job.priority,
        });
    }

    fn on_job_requeued(&self, job: &JobInfo) {
        self.push(RecordedEvent::JobRequeued { job: job.id });
    }

    fn on_job_retry_max_reached(&self, job: &JobInfo, error: &TransferError) {
        self.push(RecordedEvent::JobRetryMaxReached {
            job: job.id,
            error: error.to_string(),
        });
    }

    fn on_completed_adding_requested(&self) {
        self.push(RecordedEvent::CompletedAddingRequested);
    }

    fn on_cancellation_requested(&self) {
        self.push(RecordedEvent::CancellationRequested);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_counts_and_clears() {
        let recorder = EventRecorder::new();
        let worker = WorkerEvent {
            worker_id: 3,
            thread_name: "w3".to_string(),
        };

        recorder.on_worker_started(&worker);
        recorder.on_worker_waiting(&worker);
        recorder.on_worker_shutdown(&worker, ShutdownReason::Drained);

        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::WorkerWaiting { .. })), 1);
        assert_eq!(
            recorder.position(|e| matches!(e, RecordedEvent::WorkerShutdown { .. })),
            Some(2)
        );

        recorder.clear();
        assert!(recorder.events().is_empty());
    }
}
