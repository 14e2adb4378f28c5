//! The job abstraction
//!
//! A job is one schedulable unit of transfer work. Concrete jobs implement
//! [`Job::implementation`]; the provided [`Job::run`] wraps it with the
//! lifecycle events the scheduler and observers rely on.

use crate::error::{Result, TransferError};
use crate::job::CancellationToken;
use crate::observer::{JobEvent, JobInfo, TransferObserver, TransferProgress};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier assigned by the scheduler on enqueue
pub type JobId = u64;

/// What a job does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Create a directory
    DirectoryCreation,
    /// Copy a file
    FileCopy,
    /// Write an in-memory payload to a file
    FileCreation,
    /// Apply timestamps to an existing file
    SetTimestamps,
    /// Caller supplied closure
    Callback,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::DirectoryCreation => "directory-creation",
            JobKind::FileCopy => "file-copy",
            JobKind::FileCreation => "file-creation",
            JobKind::SetTimestamps => "set-timestamps",
            JobKind::Callback => "callback",
        };
        f.write_str(name)
    }
}

/// Local handler for a single-argument event
pub type EventHandler<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Local handler for a job failure
pub type ErrorHandler = Box<dyn Fn(&JobEvent, &TransferError) + Send + Sync>;

/// Callbacks subscribed directly on one job
///
/// They see every event before the shared observer does.
#[derive(Default)]
pub struct JobHandlers {
    on_run: Option<EventHandler<JobEvent>>,
    on_error: Option<ErrorHandler>,
    on_end: Option<EventHandler<JobEvent>>,
    on_progress: Option<EventHandler<TransferProgress>>,
}

impl JobHandlers {
    /// Subscribe to the start of each attempt
    pub fn on_run(&mut self, handler: impl Fn(&JobEvent) + Send + Sync + 'static) -> &mut Self {
        self.on_run = Some(Box::new(handler));
        self
    }

    /// Subscribe to failed attempts
    pub fn on_error(
        &mut self,
        handler: impl Fn(&JobEvent, &TransferError) + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Subscribe to successful completion
    pub fn on_end(&mut self, handler: impl Fn(&JobEvent) + Send + Sync + 'static) -> &mut Self {
        self.on_end = Some(Box::new(handler));
        self
    }

    /// Subscribe to byte progress of file jobs
    pub fn on_progress(
        &mut self,
        handler: impl Fn(&TransferProgress) + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_progress = Some(Box::new(handler));
        self
    }
}

/// State every job carries
pub struct JobCore {
    id: JobId,
    priority: i32,
    retry_count: u32,
    retry_limit: u32,
    cancellation: CancellationToken,
    observer: Option<Arc<dyn TransferObserver>>,
    handlers: JobHandlers,
}

impl JobCore {
    /// Create the core with a priority and a cancellation token
    pub fn new(priority: i32, cancellation: CancellationToken) -> Self {
        Self {
            id: 0,
            priority,
            retry_count: 0,
            retry_limit: 0,
            cancellation,
            observer: None,
            handlers: JobHandlers::default(),
        }
    }

    /// Scheduler assigned id (0 until enqueued)
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Priority; higher is dispatched sooner
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Set the priority
    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    /// Number of dispatches so far (or the retry limit once exhausted)
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The job's cancellation token
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Replace the cancellation token
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancellation = token;
    }

    /// Attached observer, if any
    pub fn observer(&self) -> Option<&Arc<dyn TransferObserver>> {
        self.observer.as_ref()
    }

    /// Set or clear the observer. The scheduler overwrites it on enqueue.
    pub fn set_observer(&mut self, observer: Option<Arc<dyn TransferObserver>>) {
        self.observer = observer;
    }

    /// Local event handlers
    pub fn handlers_mut(&mut self) -> &mut JobHandlers {
        &mut self.handlers
    }

    /// Called by the scheduler when the job joins its queue
    pub(crate) fn attach(&mut self, id: JobId, observer: Arc<dyn TransferObserver>, retry_limit: u32) {
        self.id = id;
        self.observer = Some(observer);
        self.retry_limit = retry_limit;
    }

    /// Count one dispatch
    pub(crate) fn record_attempt(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1);
    }

    /// Push the retry counter to the limit so the scheduler drops the job
    /// on this failure instead of retrying it
    pub fn exhaust_retries(&mut self) {
        self.retry_count = self.retry_count.max(self.retry_limit);
    }

    /// Deliver an event to the local handler, then the observer.
    ///
    /// The event is only built when someone listens.
    pub(crate) fn emit<E>(
        &self,
        local: Option<&EventHandler<E>>,
        make: impl FnOnce() -> E,
        shared: impl FnOnce(&dyn TransferObserver, &E),
    ) {
        if local.is_none() && self.observer.is_none() {
            return;
        }
        let event = make();
        if let Some(handler) = local {
            handler(&event);
        }
        if let Some(observer) = &self.observer {
            shared(observer.as_ref(), &event);
        }
    }

    /// Deliver a progress event
    pub(crate) fn emit_progress(
        &self,
        make: impl FnOnce() -> TransferProgress,
        shared: impl FnOnce(&dyn TransferObserver, &TransferProgress),
    ) {
        self.emit(self.handlers.on_progress.as_ref(), make, shared);
    }

    /// Deliver an event that only the shared observer receives
    pub(crate) fn notify(&self, deliver: impl FnOnce(&dyn TransferObserver)) {
        if let Some(observer) = &self.observer {
            deliver(observer.as_ref());
        }
    }

    /// Deliver a failure to the local error handler, then the observer
    pub(crate) fn emit_error(&self, make: impl FnOnce() -> JobEvent, error: &TransferError) {
        if self.handlers.on_error.is_none() && self.observer.is_none() {
            return;
        }
        let event = make();
        if let Some(handler) = &self.handlers.on_error {
            handler(&event, error);
        }
        if let Some(observer) = &self.observer {
            observer.on_job_error(&event, error);
        }
    }
}

impl fmt::Debug for JobCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCore")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("retry_count", &self.retry_count)
            .field("retry_limit", &self.retry_limit)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// A schedulable unit of work
pub trait Job: Send {
    /// Shared job state
    fn core(&self) -> &JobCore;

    /// Shared job state, mutably
    fn core_mut(&mut self) -> &mut JobCore;

    /// What kind of job this is
    fn kind(&self) -> JobKind;

    /// Human readable one-liner for logs and events
    fn describe(&self) -> String;

    /// The actual work. Must check the cancellation token at safe points.
    fn implementation(&mut self) -> Result<()>;

    /// Priority; higher is dispatched sooner
    fn priority(&self) -> i32 {
        self.core().priority()
    }

    /// Snapshot for event payloads
    fn info(&self) -> JobInfo {
        let core = self.core();
        JobInfo {
            id: core.id,
            kind: self.kind(),
            priority: core.priority,
            retry_count: core.retry_count,
            description: self.describe(),
        }
    }

    /// Run one attempt: fire `run`, execute, then fire `end` or `error`.
    ///
    /// Errors are returned to the caller; retrying is the scheduler's call.
    /// Deterministic failures exhaust the retry budget first so the
    /// scheduler drops the job right away.
    fn run(&mut self) -> Result<()> {
        let started = Utc::now();
        {
            let core = self.core();
            core.emit(
                core.handlers.on_run.as_ref(),
                || JobEvent::started(self.info(), started),
                |observer, event| observer.on_job_run(event),
            );
        }

        match self.implementation() {
            Ok(()) => {
                let finished = Utc::now();
                let core = self.core();
                core.emit(
                    core.handlers.on_end.as_ref(),
                    || JobEvent::finished(self.info(), started, finished),
                    |observer, event| observer.on_job_end(event),
                );
                Ok(())
            }
            Err(error) => {
                if error.is_deterministic() {
                    self.core_mut().exhaust_retries();
                }
                let failed = Utc::now();
                self.core()
                    .emit_error(|| JobEvent::finished(self.info(), started, failed), &error);
                Err(error)
            }
        }
    }
}

/// A job backed by a caller supplied closure
///
/// ```
/// use jobcopy::job::{CallbackJob, Job};
///
/// let mut job = CallbackJob::new("noop", |_token| Ok(()));
/// assert!(job.run().is_ok());
/// ```
pub struct CallbackJob {
    core: JobCore,
    description: String,
    work: Box<dyn FnMut(&CancellationToken) -> Result<()> + Send>,
}

impl CallbackJob {
    /// Create a job running `work` on each attempt
    pub fn new(
        description: impl Into<String>,
        work: impl FnMut(&CancellationToken) -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            core: JobCore::new(0, CancellationToken::new()),
            description: description.into(),
            work: Box::new(work),
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.core.set_priority(priority);
        self
    }

    /// Use a shared cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.core.set_cancellation(token);
        self
    }
}

impl Job for CallbackJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut JobCore {
        &mut self.core
    }

    fn kind(&self) -> JobKind {
        JobKind::Callback
    }

    fn describe(&self) -> String {
        self.description.clone()
    }

    fn implementation(&mut self) -> Result<()> {
        self.core.cancellation().check()?;
        let token = self.core.cancellation().clone();
        (self.work)(&token)
    }
}

impl fmt::Debug for CallbackJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackJob")
            .field("core", &self.core)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{EventRecorder, RecordedEvent};
    use std::sync::Mutex;

    #[test]
    fn test_run_fires_run_then_end() {
        let recorder = Arc::new(EventRecorder::new());
        let mut job = CallbackJob::new("ok", |_| Ok(()));
        job.core_mut().set_observer(Some(recorder.clone()));

        job.run().unwrap();

        let events = recorder.events();
        assert!(matches!(events[0], RecordedEvent::JobRun { .. }));
        assert!(matches!(events[1], RecordedEvent::JobEnd { .. }));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_run_reports_error_and_propagates() {
        let recorder = Arc::new(EventRecorder::new());
        let mut job = CallbackJob::new("bad", |_| {
            Err(TransferError::io("/x", std::io::Error::new(std::io::ErrorKind::Other, "boom")))
        });
        job.core_mut().set_observer(Some(recorder.clone()));

        assert!(job.run().is_err());
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobError { .. })), 1);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobEnd { .. })), 0);
    }

    #[test]
    fn test_local_handler_sees_event_before_observer() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::new(EventRecorder::new());

        let mut job = CallbackJob::new("ordered", |_| Ok(()));
        job.core_mut().set_observer(Some(recorder.clone()));

        let local_order = Arc::clone(&order);
        let observed = Arc::clone(&recorder);
        job.core_mut().handlers_mut().on_run(move |event| {
            // Observer has not seen this event yet
            assert_eq!(observed.events().len(), 0);
            local_order.lock().unwrap().push(event.job.description.clone());
        });

        job.run().unwrap();
        assert_eq!(order.lock().unwrap().as_slice(), ["ordered"]);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobRun { .. })), 1);
    }

    #[test]
    fn test_event_not_built_without_listeners() {
        let mut job = CallbackJob::new("silent", |_| Ok(()));
        // No observer, no handlers: run must still succeed
        assert!(job.run().is_ok());
    }

    #[test]
    fn test_deterministic_failure_exhausts_retries() {
        let mut job = CallbackJob::new("exists", |_| {
            Err(TransferError::AlreadyExists("/t".into()))
        });
        job.core_mut()
            .attach(7, Arc::new(crate::observer::NoopObserver), 5);
        job.core_mut().record_attempt();

        assert!(job.run().is_err());
        assert_eq!(job.core().retry_count(), 5);
        assert_eq!(job.core().id(), 7);
    }

    #[test]
    fn test_cancelled_job_does_not_run_work() {
        let token = CancellationToken::new();
        token.cancel();
        let mut job = CallbackJob::new("never", |_| panic!("must not run")).with_cancellation(token);
        assert!(matches!(job.run(), Err(TransferError::Cancelled)));
    }
}
