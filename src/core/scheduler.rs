//! Job scheduling and the worker pool
//!
//! A `JobScheduler` owns one priority queue and a pool of worker threads
//! draining it. The protocol is:
//!
//! 1. `start` spawns the configured number of workers
//! 2. producers `add` jobs (before or after `start`)
//! 3. `complete_adding` tells workers to exit once the queue is empty
//! 4. `wait_for_finish` blocks until the last worker has exited
//!
//! `cancel` makes every worker exit at its next look at the queue; jobs
//! still queued are abandoned without events.
//!
//! Queue, worker registry and flags live under a single mutex. Jobs run
//! with the mutex released. Queue events (`enqueued`, `dequeued`,
//! `requeued`, `picked`) fire while it is held, so observers must not call
//! back into the scheduler from those callbacks.

use super::queue::JobQueue;
use super::worker::{run_worker, WorkerState};
use crate::config::SchedulerConfig;
use crate::error::{Result, TransferError};
use crate::job::{Job, JobId};
use crate::observer::{NoopObserver, TransferObserver, WorkerEvent, WorkerId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Scheduler statistics
#[derive(Debug, Default)]
pub struct SchedulerStats {
    /// Jobs accepted by `add`
    pub enqueued: AtomicU64,
    /// Attempts started
    pub dispatched: AtomicU64,
    /// Jobs that succeeded
    pub completed: AtomicU64,
    /// Failed attempts put back in the queue
    pub requeued: AtomicU64,
    /// Jobs dropped after their last attempt failed
    pub dropped: AtomicU64,
}

impl SchedulerStats {
    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`SchedulerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Jobs accepted by `add`
    pub enqueued: u64,
    /// Attempts started
    pub dispatched: u64,
    /// Jobs that succeeded
    pub completed: u64,
    /// Failed attempts put back in the queue
    pub requeued: u64,
    /// Jobs dropped after their last attempt failed
    pub dropped: u64,
}

impl StatsSnapshot {
    /// Jobs that reached a terminal state
    pub fn finished(&self) -> u64 {
        self.completed + self.dropped
    }
}

/// Everything guarded by the scheduler mutex
pub(crate) struct SchedulerState {
    pub(crate) queue: JobQueue,
    pub(crate) workers: HashMap<WorkerId, WorkerState>,
    pub(crate) handles: Vec<JoinHandle<()>>,
    pub(crate) working: bool,
    pub(crate) adding_completed: bool,
    pub(crate) cancel_requested: bool,
}

/// State shared between the scheduler handle and its workers
pub(crate) struct Shared {
    pub(crate) config: SchedulerConfig,
    pub(crate) observer: Arc<dyn TransferObserver>,
    pub(crate) state: Mutex<SchedulerState>,
    pub(crate) work_available: Condvar,
    pub(crate) all_stopped: Condvar,
    pub(crate) removal_credits: AtomicUsize,
    pub(crate) stats: SchedulerStats,
    next_job_id: AtomicU64,
    next_worker_id: AtomicU64,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take one removal credit if any is outstanding
    pub(crate) fn try_consume_credit(&self) -> bool {
        self.removal_credits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |credits| {
                credits.checked_sub(1)
            })
            .is_ok()
    }

    fn enqueue(&self, state: &mut SchedulerState, mut job: Box<dyn Job>) -> JobId {
        let id = self.next_job_id.fetch_add(1, Ordering::Relaxed) + 1;
        job.core_mut()
            .attach(id, Arc::clone(&self.observer), self.config.max_retry_attempts);
        let info = job.info();
        state.queue.push(job);
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.observer.on_job_enqueued(&info);
        self.work_available.notify_one();
        id
    }
}

/// Priority job scheduler with a worker thread pool
pub struct JobScheduler {
    shared: Arc<Shared>,
}

impl JobScheduler {
    /// Create a scheduler that reports to nobody
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    /// Create a scheduler reporting every event to `observer`
    pub fn with_observer(
        config: SchedulerConfig,
        observer: Arc<dyn TransferObserver>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                observer,
                state: Mutex::new(SchedulerState {
                    queue: JobQueue::new(),
                    workers: HashMap::new(),
                    handles: Vec::new(),
                    working: false,
                    adding_completed: false,
                    cancel_requested: false,
                }),
                work_available: Condvar::new(),
                all_stopped: Condvar::new(),
                removal_credits: AtomicUsize::new(0),
                stats: SchedulerStats::default(),
                next_job_id: AtomicU64::new(0),
                next_worker_id: AtomicU64::new(0),
            }),
        })
    }

    /// Configured limits
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Spawn `max_worker_count` workers. Does nothing if already started.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.shared.lock();
            if state.working {
                return Ok(());
            }
            state.working = true;
        }
        info!(
            workers = self.shared.config.max_worker_count,
            retries = self.shared.config.max_retry_attempts,
            "starting scheduler"
        );
        self.add_workers(self.shared.config.max_worker_count)
    }

    /// Queue one job
    pub fn add(&self, job: Box<dyn Job>) -> Result<JobId> {
        let mut state = self.shared.lock();
        if state.adding_completed {
            return Err(TransferError::AddingCompleted);
        }
        Ok(self.shared.enqueue(&mut state, job))
    }

    /// Queue a batch of jobs under one lock acquisition
    pub fn add_range<I>(&self, jobs: I) -> Result<Vec<JobId>>
    where
        I: IntoIterator<Item = Box<dyn Job>>,
    {
        let mut state = self.shared.lock();
        if state.adding_completed {
            return Err(TransferError::AddingCompleted);
        }
        let ids: Vec<JobId> = jobs
            .into_iter()
            .map(|job| self.shared.enqueue(&mut state, job))
            .collect();
        debug!(count = ids.len(), "queued batch");
        Ok(ids)
    }

    /// No more jobs will be added; workers exit once the queue is empty
    pub fn complete_adding(&self) {
        self.shared.observer.on_completed_adding_requested();
        let mut state = self.shared.lock();
        state.adding_completed = true;
        self.shared.work_available.notify_all();
    }

    /// Stop every worker at its next look at the queue
    pub fn cancel(&self) {
        self.shared.observer.on_cancellation_requested();
        let mut state = self.shared.lock();
        if !state.cancel_requested {
            state.cancel_requested = true;
            info!(abandoned = state.queue.len(), "scheduler cancelled");
        }
        self.shared.work_available.notify_all();
    }

    /// Block until every worker has exited, then join their threads.
    ///
    /// Fails with [`TransferError::AddingNotCompleted`] unless
    /// `complete_adding` was called first.
    pub fn wait_for_finish(&self) -> Result<()> {
        let handles = {
            let mut state = self.shared.lock();
            if !state.adding_completed {
                return Err(TransferError::AddingNotCompleted);
            }
            while !state.workers.is_empty() {
                state = self
                    .shared
                    .all_stopped
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            std::mem::take(&mut state.handles)
        };

        for handle in handles {
            if handle.join().is_err() {
                warn!("worker thread terminated abnormally");
            }
        }
        let stats = self.stats();
        info!(
            completed = stats.completed,
            dropped = stats.dropped,
            requeued = stats.requeued,
            "scheduler finished"
        );
        Ok(())
    }

    /// Spawn and start `count` more workers now
    pub fn add_workers(&self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.spawn_worker()?;
        }
        Ok(())
    }

    /// Ask `count` workers to exit; whichever workers look at the queue
    /// next take the credits
    pub fn remove_workers(&self, count: usize) {
        let _state = self.shared.lock();
        self.shared.removal_credits.fetch_add(count, Ordering::AcqRel);
        self.shared.work_available.notify_all();
    }

    fn spawn_worker(&self) -> Result<()> {
        let worker_id = self.shared.next_worker_id.fetch_add(1, Ordering::Relaxed) + 1;
        let event = WorkerEvent {
            worker_id,
            thread_name: format!("jobcopy-worker-{}", worker_id),
        };

        let mut state = self.shared.lock();
        state.workers.insert(worker_id, WorkerState::Created);
        self.shared.observer.on_worker_created(&event);

        let shared = Arc::clone(&self.shared);
        let thread_event = event.clone();
        let spawned = std::thread::Builder::new()
            .name(event.thread_name.clone())
            .spawn(move || run_worker(shared, thread_event));

        match spawned {
            Ok(handle) => {
                state.handles.push(handle);
                Ok(())
            }
            Err(e) => {
                state.workers.remove(&worker_id);
                if state.workers.is_empty() {
                    self.shared.all_stopped.notify_all();
                }
                Err(TransferError::ThreadSpawn(e))
            }
        }
    }

    /// Jobs waiting in the queue
    pub fn pending_count(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Workers that have not exited yet
    pub fn live_worker_count(&self) -> usize {
        self.shared.lock().workers.len()
    }

    /// Current state of each live worker
    pub fn worker_states(&self) -> Vec<(WorkerId, WorkerState)> {
        let mut states: Vec<_> = self
            .shared
            .lock()
            .workers
            .iter()
            .map(|(id, state)| (*id, *state))
            .collect();
        states.sort_by_key(|(id, _)| *id);
        states
    }

    /// Whether `start` has been called
    pub fn is_working(&self) -> bool {
        self.shared.lock().working
    }

    /// Whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.shared.lock().cancel_requested
    }

    /// Whether `complete_adding` has been called
    pub fn is_adding_completed(&self) -> bool {
        self.shared.lock().adding_completed
    }

    /// Counters so far
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if !state.workers.is_empty() {
            state.cancel_requested = true;
            self.shared.work_available.notify_all();
        }
    }
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("JobScheduler")
            .field("config", &self.shared.config)
            .field("queue", &state.queue)
            .field("live_workers", &state.workers.len())
            .field("adding_completed", &state.adding_completed)
            .field("cancel_requested", &state.cancel_requested)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{open_write, WriteMode};
    use crate::job::{CallbackJob, FileCopyJob, WriteOptions};
    use crate::observer::{EventRecorder, ObserverSet, RecordedEvent, ShutdownReason, TransferProgress};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicU32};
    use std::sync::{mpsc, Barrier};
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(workers: usize, retries: u32) -> SchedulerConfig {
        SchedulerConfig {
            max_worker_count: workers,
            max_retry_attempts: retries,
        }
    }

    fn recorded(workers: usize, retries: u32) -> (JobScheduler, Arc<EventRecorder>) {
        let recorder = Arc::new(EventRecorder::new());
        let scheduler = JobScheduler::with_observer(config(workers, retries), recorder.clone()).unwrap();
        (scheduler, recorder)
    }

    fn failing(name: &str, runs: Arc<AtomicU32>) -> Box<dyn Job> {
        Box::new(CallbackJob::new(name, move |_| {
            runs.fetch_add(1, Ordering::SeqCst);
            Err(TransferError::io("/flaky", std::io::Error::new(std::io::ErrorKind::Other, "flaky")))
        }))
    }

    #[test]
    fn test_rejects_zero_workers() {
        assert!(matches!(
            JobScheduler::new(config(0, 1)),
            Err(TransferError::ConfigError(_))
        ));
    }

    #[test]
    fn test_higher_priority_dispatched_first() {
        let (scheduler, recorder) = recorded(1, 1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for (name, priority) in [("low", 0), ("high", 10), ("mid", 5)] {
            let order = Arc::clone(&order);
            scheduler
                .add(Box::new(
                    CallbackJob::new(name, move |_| {
                        order.lock().unwrap().push(name);
                        Ok(())
                    })
                    .with_priority(priority),
                ))
                .unwrap();
        }

        scheduler.start().unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        assert_eq!(order.lock().unwrap().as_slice(), ["high", "mid", "low"]);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobDequeued { .. })), 3);
    }

    #[test]
    fn test_failing_job_runs_exactly_max_attempts() {
        let (scheduler, recorder) = recorded(2, 3);
        let runs = Arc::new(AtomicU32::new(0));

        scheduler.add(failing("flaky", Arc::clone(&runs))).unwrap();
        scheduler.start().unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobRequeued { .. })), 2);
        assert_eq!(
            recorder.count(|e| matches!(e, RecordedEvent::JobRetryMaxReached { .. })),
            1
        );
        let last_retry_max = recorder
            .position(|e| matches!(e, RecordedEvent::JobRetryMaxReached { .. }))
            .unwrap();
        let events = recorder.events();
        assert!(events[last_retry_max..]
            .iter()
            .all(|e| !matches!(e, RecordedEvent::JobRun { .. })));
        assert_eq!(scheduler.stats().dropped, 1);
    }

    #[test]
    fn test_zero_retry_budget_still_runs_once() {
        let (scheduler, recorder) = recorded(1, 0);
        let runs = Arc::new(AtomicU32::new(0));

        scheduler.add(failing("once", Arc::clone(&runs))).unwrap();
        scheduler.start().unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobRequeued { .. })), 0);
        assert_eq!(
            recorder.count(|e| matches!(e, RecordedEvent::JobRetryMaxReached { .. })),
            1
        );
    }

    #[test]
    fn test_many_jobs_drain_for_various_pool_sizes() {
        for workers in [1, 2, 8] {
            let scheduler = JobScheduler::new(config(workers, 3)).unwrap();
            let done = Arc::new(AtomicU32::new(0));

            scheduler.start().unwrap();
            let jobs: Vec<Box<dyn Job>> = (0..100)
                .map(|i| {
                    let done = Arc::clone(&done);
                    Box::new(
                        CallbackJob::new(format!("job-{}", i), move |_| {
                            done.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .with_priority(i % 7),
                    ) as Box<dyn Job>
                })
                .collect();
            scheduler.add_range(jobs).unwrap();
            scheduler.complete_adding();
            scheduler.wait_for_finish().unwrap();

            assert_eq!(done.load(Ordering::SeqCst), 100, "workers = {}", workers);
            assert_eq!(scheduler.pending_count(), 0);
            assert_eq!(scheduler.live_worker_count(), 0);
            assert_eq!(scheduler.stats().completed, 100);
        }
    }

    #[test]
    fn test_existing_target_is_not_retried() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src.txt");
        let target = temp.path().join("dst.txt");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(&target, b"old").unwrap();

        let (scheduler, recorder) = recorded(2, 5);
        scheduler
            .add(Box::new(
                FileCopyJob::new(&source, &target).with_options(WriteOptions::new().overwrite(false)),
            ))
            .unwrap();
        scheduler.start().unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobError { .. })), 1);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobRun { .. })), 1);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobRequeued { .. })), 0);
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
    }

    #[test]
    fn test_file_copy_heals_missing_parents() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src.txt");
        std::fs::write(&source, b"payload").unwrap();
        let target = temp.path().join("deep/er/tree/dst.txt");

        let scheduler = JobScheduler::new(config(1, 1)).unwrap();
        scheduler.add(Box::new(FileCopyJob::new(&source, &target))).unwrap();
        scheduler.start().unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"payload");
        assert_eq!(scheduler.stats().completed, 1);
    }

    #[test]
    fn test_cancel_abandons_queued_jobs() {
        let (scheduler, recorder) = recorded(1, 1);
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let ran = Arc::new(AtomicU32::new(0));

        scheduler
            .add(Box::new(
                CallbackJob::new("blocker", move |_| {
                    entered_tx.send(()).unwrap();
                    release_rx.lock().unwrap().recv().unwrap();
                    Ok(())
                })
                .with_priority(100),
            ))
            .unwrap();
        for i in 0..5 {
            let ran = Arc::clone(&ran);
            scheduler
                .add(Box::new(CallbackJob::new(format!("queued-{}", i), move |_| {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })))
                .unwrap();
        }

        scheduler.start().unwrap();
        entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        scheduler.cancel();
        scheduler.complete_adding();
        release_tx.send(()).unwrap();
        scheduler.wait_for_finish().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_count(), 5);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobRun { .. })), 1);
        assert_eq!(
            recorder.count(|e| matches!(
                e,
                RecordedEvent::WorkerShutdown { reason: ShutdownReason::Cancelled, .. }
            )),
            1
        );
    }

    #[test]
    fn test_precondition_violations() {
        let scheduler = JobScheduler::new(config(1, 1)).unwrap();
        assert!(matches!(
            scheduler.wait_for_finish(),
            Err(TransferError::AddingNotCompleted)
        ));

        scheduler.complete_adding();
        let late = scheduler.add(Box::new(CallbackJob::new("late", |_| Ok(()))));
        assert!(matches!(late, Err(TransferError::AddingCompleted)));
        let late_batch = scheduler.add_range(vec![Box::new(CallbackJob::new("late", |_| Ok(()))) as Box<dyn Job>]);
        assert!(matches!(late_batch, Err(TransferError::AddingCompleted)));

        // Never started: nothing to wait for
        scheduler.wait_for_finish().unwrap();
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (scheduler, recorder) = recorded(3, 1);
        scheduler.start().unwrap();
        scheduler.start().unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::WorkerCreated { .. })), 3);
        assert_eq!(
            recorder.count(|e| matches!(
                e,
                RecordedEvent::WorkerShutdown { reason: ShutdownReason::Drained, .. }
            )),
            3
        );
    }

    #[test]
    fn test_add_and_remove_workers() {
        let (scheduler, recorder) = recorded(2, 1);
        scheduler.start().unwrap();
        scheduler.add_workers(2).unwrap();
        scheduler.remove_workers(3);

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while scheduler.live_worker_count() > 1 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(scheduler.live_worker_count(), 1);

        let done = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&done);
        scheduler
            .add(Box::new(CallbackJob::new("after-removal", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })))
            .unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(
            recorder.count(|e| matches!(
                e,
                RecordedEvent::WorkerShutdown { reason: ShutdownReason::Removed, .. }
            )),
            3
        );
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let (scheduler, recorder) = recorded(1, 2);
        let survived = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&survived);

        scheduler
            .add(Box::new(
                CallbackJob::new("panics", |_| panic!("boom")).with_priority(1),
            ))
            .unwrap();
        scheduler
            .add(Box::new(CallbackJob::new("after", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })))
            .unwrap();
        scheduler.start().unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        assert_eq!(survived.load(Ordering::SeqCst), 1);
        assert_eq!(
            recorder.count(|e| matches!(e, RecordedEvent::JobRetryMaxReached { .. })),
            1
        );
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::WorkerCreated { .. })), 1);
    }

    #[test]
    fn test_jobs_added_after_start_wake_workers() {
        let temp = TempDir::new().unwrap();
        let scheduler = JobScheduler::new(config(2, 1)).unwrap();
        scheduler.start().unwrap();

        let path = temp.path().join("late.txt");
        let target = path.clone();
        scheduler
            .add(Box::new(CallbackJob::new("late", move |_| {
                open_write(&target, WriteMode::CreateOrOpen).map(|_| ())
            })))
            .unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        assert!(path.exists());
    }

    /// Turns the source directory into a regular file after the first
    /// failed copy attempt
    struct ReplaceSourceOnError {
        source: PathBuf,
        contents: Vec<u8>,
        replaced: AtomicBool,
    }

    impl TransferObserver for ReplaceSourceOnError {
        fn on_file_copy_error(&self, _event: &TransferProgress, _error: &TransferError) {
            if !self.replaced.swap(true, Ordering::SeqCst) {
                std::fs::remove_dir(&self.source).unwrap();
                std::fs::write(&self.source, &self.contents).unwrap();
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_retry_rewrites_own_partial_target() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src.bin");
        let target = temp.path().join("out/dst.bin");
        // Opening a directory succeeds, reading it fails after the target exists
        std::fs::create_dir(&source).unwrap();

        let recorder = Arc::new(EventRecorder::new());
        let replacer = Arc::new(ReplaceSourceOnError {
            source: source.clone(),
            contents: b"second attempt".to_vec(),
            replaced: AtomicBool::new(false),
        });
        let observers = ObserverSet::new().with(recorder.clone()).with(replacer);
        let scheduler = JobScheduler::with_observer(config(1, 3), Arc::new(observers)).unwrap();

        scheduler
            .add(Box::new(
                FileCopyJob::new(&source, &target).with_options(WriteOptions::new().overwrite(false)),
            ))
            .unwrap();
        scheduler.start().unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"second attempt");
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobRun { .. })), 2);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobRequeued { .. })), 1);
        assert_eq!(
            recorder.count(|e| matches!(e, RecordedEvent::JobRetryMaxReached { .. })),
            0
        );
        assert_eq!(scheduler.stats().completed, 1);
    }

    #[test]
    fn test_panic_reaches_local_error_handler_first() {
        let (scheduler, recorder) = recorded(1, 1);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut job = CallbackJob::new("panics", |_| panic!("boom"));
        let (log, shared) = (Arc::clone(&seen), Arc::clone(&recorder));
        job.core_mut().handlers_mut().on_error(move |_, error| {
            let shared_errors = shared.count(|e| matches!(e, RecordedEvent::JobError { .. }));
            log.lock().unwrap().push((error.to_string(), shared_errors));
        });

        scheduler.add(Box::new(job)).unwrap();
        scheduler.start().unwrap();
        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.contains("boom"));
        assert_eq!(seen[0].1, 0);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::JobError { .. })), 1);
    }

    #[test]
    fn test_jobs_run_concurrently() {
        let scheduler = Arc::new(JobScheduler::new(config(2, 1)).unwrap());
        let barrier = Arc::new(Barrier::new(2));

        for name in ["left", "right"] {
            let barrier = Arc::clone(&barrier);
            scheduler
                .add(Box::new(CallbackJob::new(name, move |_| {
                    barrier.wait();
                    Ok(())
                })))
                .unwrap();
        }
        scheduler.complete_adding();

        let (done_tx, done_rx) = mpsc::channel();
        let runner = Arc::clone(&scheduler);
        std::thread::spawn(move || {
            runner.start().unwrap();
            runner.wait_for_finish().unwrap();
            done_tx.send(runner.stats()).unwrap();
        });

        let stats = done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("both jobs should be in flight at the same time");
        assert_eq!(stats.completed, 2);
    }

    #[test]
    fn test_worker_states_and_working_flag() {
        let scheduler = JobScheduler::new(config(2, 1)).unwrap();
        assert!(!scheduler.is_working());
        assert!(scheduler.worker_states().is_empty());

        scheduler.start().unwrap();
        assert!(scheduler.is_working());

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        let idle = |states: &[(WorkerId, WorkerState)]| {
            states.len() == 2 && states.iter().all(|(_, s)| *s == WorkerState::Waiting)
        };
        while !idle(&scheduler.worker_states()) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let states = scheduler.worker_states();
        assert!(idle(&states), "{:?}", states);
        assert!(states[0].0 < states[1].0);

        scheduler.complete_adding();
        scheduler.wait_for_finish().unwrap();
        assert!(scheduler.worker_states().is_empty());
    }
}
