//! Observer writing every event to `tracing`

use super::{
    DirectoryEvent, JobEvent, JobInfo, ShutdownReason, TransferObserver, TransferProgress,
    WorkerEvent,
};
use crate::error::TransferError;
use tracing::{debug, info, trace, warn};

/// Turns engine events into structured log records
///
/// Worker and queue transitions log at `debug`, per-chunk progress at
/// `trace`, completions at `info` and failures at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl LoggingObserver {
    /// Create a logging observer
    pub fn new() -> Self {
        Self
    }
}

impl TransferObserver for LoggingObserver {
    fn on_directory_creating(&self, event: &DirectoryEvent) {
        debug!(job = event.job_id, path = %event.path.display(), "creating directory");
    }

    fn on_directory_created(&self, event: &DirectoryEvent) {
        debug!(
            job = event.job_id,
            path = %event.path.display(),
            created = event.created,
            "directory ready"
        );
    }

    fn on_directory_error(&self, event: &DirectoryEvent, error: &TransferError) {
        warn!(job = event.job_id, path = %event.path.display(), %error, "directory creation failed");
    }

    fn on_file_copy_started(&self, event: &TransferProgress) {
        debug!(
            job = event.job_id,
            target = %event.target.display(),
            bytes = event.total_bytes,
            "copy started"
        );
    }

    fn on_file_copy_progress(&self, event: &TransferProgress) {
        trace!(
            job = event.job_id,
            bytes = event.bytes_transferred,
            total = event.total_bytes,
            throughput = event.throughput(),
            "copy progress"
        );
    }

    fn on_file_copy_finished(&self, event: &TransferProgress) {
        info!(
            job = event.job_id,
            target = %event.target.display(),
            bytes = event.bytes_transferred,
            elapsed = ?event.elapsed,
            "copied {}",
            humansize::format_size(event.bytes_transferred, humansize::BINARY)
        );
    }

    fn on_file_copy_error(&self, event: &TransferProgress, error: &TransferError) {
        warn!(job = event.job_id, target = %event.target.display(), %error, "copy failed");
    }

    fn on_file_creation_started(&self, event: &TransferProgress) {
        debug!(job = event.job_id, target = %event.target.display(), "creation started");
    }

    fn on_file_creation_progress(&self, event: &TransferProgress) {
        trace!(job = event.job_id, bytes = event.bytes_transferred, "creation progress");
    }

    fn on_file_creation_finished(&self, event: &TransferProgress) {
        info!(
            job = event.job_id,
            target = %event.target.display(),
            bytes = event.bytes_transferred,
            "file created"
        );
    }

    fn on_file_creation_error(&self, event: &TransferProgress, error: &TransferError) {
        warn!(job = event.job_id, target = %event.target.display(), %error, "creation failed");
    }

    fn on_worker_created(&self, worker: &WorkerEvent) {
        debug!(worker = worker.worker_id, "worker created");
    }

    fn on_worker_started(&self, worker: &WorkerEvent) {
        debug!(worker = worker.worker_id, thread = %worker.thread_name, "worker started");
    }

    fn on_worker_waiting(&self, worker: &WorkerEvent) {
        trace!(worker = worker.worker_id, "worker waiting");
    }

    fn on_worker_woke_up(&self, worker: &WorkerEvent) {
        trace!(worker = worker.worker_id, "worker woke up");
    }

    fn on_worker_picked_job(&self, worker: &WorkerEvent, job: &JobInfo) {
        debug!(worker = worker.worker_id, job = job.id, kind = %job.kind, "picked job");
    }

    fn on_worker_shutdown(&self, worker: &WorkerEvent, reason: ShutdownReason) {
        debug!(worker = worker.worker_id, ?reason, "worker shut down");
    }

    fn on_job_run(&self, event: &JobEvent) {
        debug!(
            job = event.job.id,
            attempt = event.job.retry_count,
            "running {}",
            event.job.description
        );
    }

    fn on_job_error(&self, event: &JobEvent, error: &TransferError) {
        warn!(job = event.job.id, attempt = event.job.retry_count, %error, "job failed");
    }

    fn on_job_end(&self, event: &JobEvent) {
        debug!(
            job = event.job.id,
            duration_ms = event.duration().map(|d| d.num_milliseconds()),
            "job finished"
        );
    }

    fn on_job_enqueued(&self, job: &JobInfo) {
        trace!(job = job.id, priority = job.priority, "enqueued");
    }

    fn on_job_dequeued(&self, job: &JobInfo) {
        trace!(job = job.id, priority = job.priority, "dequeued");
    }

    fn on_job_requeued(&self, job: &JobInfo) {
        debug!(job = job.id, attempt = job.retry_count, "requeued for retry");
    }

    fn on_job_retry_max_reached(&self, job: &JobInfo, error: &TransferError) {
        warn!(job = job.id, attempts = job.retry_count, %error, "giving up on {}", job.description);
    }

    fn on_completed_adding_requested(&self) {
        debug!("adding completed");
    }

    fn on_cancellation_requested(&self) {
        info!("cancellation requested");
    }
}
