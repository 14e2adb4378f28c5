//! Observer capability
//!
//! One callback per job, queue and worker event. Every method has a no-op
//! default so an implementation only overrides what it cares about.
//!
//! The scheduler does not serialize observer calls: with more than one
//! worker, callbacks arrive concurrently from several threads. The
//! `Send + Sync` bound makes that the implementor's problem.

mod events;
mod logging;
mod recorder;

pub use events::*;
pub use logging::LoggingObserver;
pub use recorder::{EventRecorder, RecordedEvent};

use crate::error::TransferError;
use std::sync::Arc;

/// Sink for every event the engine fires
#[allow(unused_variables)]
pub trait TransferObserver: Send + Sync {
    /// Directory creation is about to start
    fn on_directory_creating(&self, event: &DirectoryEvent) {}
    /// Directory exists (created or already present)
    fn on_directory_created(&self, event: &DirectoryEvent) {}
    /// Directory creation failed
    fn on_directory_error(&self, event: &DirectoryEvent, error: &TransferError) {}

    /// File copy opened its handles
    fn on_file_copy_started(&self, event: &TransferProgress) {}
    /// A chunk was copied
    fn on_file_copy_progress(&self, event: &TransferProgress) {}
    /// Contents and metadata copied
    fn on_file_copy_finished(&self, event: &TransferProgress) {}
    /// File copy failed
    fn on_file_copy_error(&self, event: &TransferProgress, error: &TransferError) {}

    /// File creation started
    fn on_file_creation_started(&self, event: &TransferProgress) {}
    /// A chunk of the payload was written
    fn on_file_creation_progress(&self, event: &TransferProgress) {}
    /// Payload fully written
    fn on_file_creation_finished(&self, event: &TransferProgress) {}
    /// File creation failed
    fn on_file_creation_error(&self, event: &TransferProgress, error: &TransferError) {}

    /// Worker registered, thread not yet running
    fn on_worker_created(&self, worker: &WorkerEvent) {}
    /// Worker thread entered its loop
    fn on_worker_started(&self, worker: &WorkerEvent) {}
    /// Worker is about to block on the empty queue
    fn on_worker_waiting(&self, worker: &WorkerEvent) {}
    /// Worker woke up
    fn on_worker_woke_up(&self, worker: &WorkerEvent) {}
    /// Worker took a job off the queue
    fn on_worker_picked_job(&self, worker: &WorkerEvent, job: &JobInfo) {}
    /// Worker left its loop
    fn on_worker_shutdown(&self, worker: &WorkerEvent, reason: ShutdownReason) {}

    /// An attempt started
    fn on_job_run(&self, event: &JobEvent) {}
    /// An attempt failed
    fn on_job_error(&self, event: &JobEvent, error: &TransferError) {}
    /// The job succeeded
    fn on_job_end(&self, event: &JobEvent) {}
    /// Job joined the queue
    fn on_job_enqueued(&self, job: &JobInfo) {}
    /// Job left the queue for execution
    fn on_job_dequeued(&self, job: &JobInfo) {}
    /// Failed job went back into the queue
    fn on_job_requeued(&self, job: &JobInfo) {}
    /// Failed job used up its retries and is dropped
    fn on_job_retry_max_reached(&self, job: &JobInfo, error: &TransferError) {}

    /// Producer called `complete_adding`
    fn on_completed_adding_requested(&self) {}
    /// Scheduler cancellation requested
    fn on_cancellation_requested(&self) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Forwards every event to several observers in order
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn TransferObserver>>,
}

impl ObserverSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer
    pub fn with(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of observers
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    fn each(&self, f: impl Fn(&dyn TransferObserver)) {
        for observer in &self.observers {
            f(observer.as_ref());
        }
    }
}

impl TransferObserver for ObserverSet {
    fn on_directory_creating(&self, event: &DirectoryEvent) {
        self.each(|o| o.on_directory_creating(event));
    }
    fn on_directory_created(&self, event: &DirectoryEvent) {
        self.each(|o| o.on_directory_created(event));
    }
    fn on_directory_error(&self, event: &DirectoryEvent, error: &TransferError) {
        self.each(|o| o.on_directory_error(event, error));
    }
    fn on_file_copy_started(&self, event: &TransferProgress) {
        self.each(|o| o.on_file_copy_started(event));
    }
    fn on_file_copy_progress(&self, event: &TransferProgress) {
        self.each(|o| o.on_file_copy_progress(event));
    }
    fn on_file_copy_finished(&self, event: &TransferProgress) {
        self.each(|o| o.on_file_copy_finished(event));
    }
    fn on_file_copy_error(&self, event: &TransferProgress, error: &TransferError) {
        self.each(|o| o.on_file_copy_error(event, error));
    }
    fn on_file_creation_started(&self, event: &TransferProgress) {
        self.each(|o| o.on_file_creation_started(event));
    }
    fn on_file_creation_progress(&self, event: &TransferProgress) {
        self.each(|o| o.on_file_creation_progress(event));
    }
    fn on_file_creation_finished(&self, event: &TransferProgress) {
        self.each(|o| o.on_file_creation_finished(event));
    }
    fn on_file_creation_error(&self, event: &TransferProgress, error: &TransferError) {
        self.each(|o| o.on_file_creation_error(event, error));
    }
    fn on_worker_created(&self, worker: &WorkerEvent) {
        self.each(|o| o.on_worker_created(worker));
    }
    fn on_worker_started(&self, worker: &WorkerEvent) {
        self.each(|o| o.on_worker_started(worker));
    }
    fn on_worker_waiting(&self, worker: &WorkerEvent) {
        self.each(|o| o.on_worker_waiting(worker));
    }
    fn on_worker_woke_up(&self, worker: &WorkerEvent) {
        self.each(|o| o.on_worker_woke_up(worker));
    }
    fn on_worker_picked_job(&self, worker: &WorkerEvent, job: &JobInfo) {
        self.each(|o| o.on_worker_picked_job(worker, job));
    }
    fn on_worker_shutdown(&self, worker: &WorkerEvent, reason: ShutdownReason) {
        self.each(|o| o.on_worker_shutdown(worker, reason));
    }
    fn on_job_run(&self, event: &JobEvent) {
        self.each(|o| o.on_job_run(event));
    }
    fn on_job_error(&self, event: &JobEvent, error: &TransferError) {
        self.each(|o| o.on_job_error(event, error));
    }
    fn on_job_end(&self, event: &JobEvent) {
        self.each(|o| o.on_job_end(event));
    }
    fn on_job_enqueued(&self, job: &JobInfo) {
        self.each(|o| o.on_job_enqueued(job));
    }
    fn on_job_dequeued(&self, job: &JobInfo) {
        self.each(|o| o.on_job_dequeued(job));
    }
    fn on_job_requeued(&self, job: &JobInfo) {
        self.each(|o| o.on_job_requeued(job));
    }
    fn on_job_retry_max_reached(&self, job: &JobInfo, error: &TransferError) {
        self.each(|o| o.on_job_retry_max_reached(job, error));
    }
    fn on_completed_adding_requested(&self) {
        self.each(|o| o.on_completed_adding_requested());
    }
    fn on_cancellation_requested(&self) {
        self.each(|o| o.on_cancellation_requested());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observer_set_fans_out() {
        let first = Arc::new(EventRecorder::new());
        let second = Arc::new(EventRecorder::new());
        let set = ObserverSet::new()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(NoopObserver));

        set.on_cancellation_requested();
        set.on_completed_adding_requested();

        assert_eq!(set.len(), 3);
        assert_eq!(first.events(), second.events());
        assert_eq!(
            first.events(),
            vec![
                RecordedEvent::CancellationRequested,
                RecordedEvent::CompletedAddingRequested
            ]
        );
    }
}
