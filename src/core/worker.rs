//! Worker loop
//!
//! Each worker repeatedly takes the scheduler lock and decides, in order:
//! cancelled, removal credit available, job available, drained, or wait.
//! The chosen job runs with the lock released.

use super::scheduler::Shared;
use crate::error::TransferError;
use crate::job::Job;
use crate::observer::{JobEvent, ShutdownReason, WorkerEvent};
use chrono::Utc;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use tracing::{debug, warn};

/// Where a worker is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Registered, thread not running yet
    Created,
    /// Thread entered its loop
    Started,
    /// Blocked on an empty queue
    Waiting,
    /// Running a job
    Executing,
}

/// Thread body of one worker
pub(crate) fn run_worker(shared: Arc<Shared>, worker: WorkerEvent) {
    shared.observer.on_worker_started(&worker);
    set_state(&shared, &worker, WorkerState::Started);

    let reason = loop {
        match next_job(&shared, &worker) {
            Ok(job) => execute(&shared, job),
            Err(reason) => break reason,
        }
    };

    shared.observer.on_worker_shutdown(&worker, reason);
    debug!(worker = worker.worker_id, ?reason, "worker exiting");

    let mut state = shared.lock();
    state.workers.remove(&worker.worker_id);
    if state.workers.is_empty() {
        shared.all_stopped.notify_all();
    }
}

fn set_state(shared: &Shared, worker: &WorkerEvent, new_state: WorkerState) {
    if let Some(state) = shared.lock().workers.get_mut(&worker.worker_id) {
        *state = new_state;
    }
}

/// Block until there is a job to run or a reason to exit
fn next_job(shared: &Shared, worker: &WorkerEvent) -> Result<Box<dyn Job>, ShutdownReason> {
    let mut state = shared.lock();
    loop {
        if state.cancel_requested {
            return Err(ShutdownReason::Cancelled);
        }
        if shared.try_consume_credit() {
            return Err(ShutdownReason::Removed);
        }
        if let Some(job) = state.queue.pop() {
            let info = job.info();
            shared.observer.on_worker_picked_job(worker, &info);
            shared.observer.on_job_dequeued(&info);
            if let Some(slot) = state.workers.get_mut(&worker.worker_id) {
                *slot = WorkerState::Executing;
            }
            return Ok(job);
        }
        if state.adding_completed {
            return Err(ShutdownReason::Drained);
        }

        if let Some(slot) = state.workers.get_mut(&worker.worker_id) {
            *slot = WorkerState::Waiting;
        }
        shared.observer.on_worker_waiting(worker);
        state = shared
            .work_available
            .wait(state)
            .unwrap_or_else(PoisonError::into_inner);
        shared.observer.on_worker_woke_up(worker);
    }
}

/// One attempt, then success, requeue or drop
fn execute(shared: &Shared, mut job: Box<dyn Job>) {
    job.core_mut().record_attempt();
    shared.stats.dispatched.fetch_add(1, Ordering::Relaxed);

    let started = Utc::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.run()));
    let result = outcome.unwrap_or_else(|payload| {
        let error = TransferError::JobPanicked(panic_message(payload.as_ref()));
        job.core()
            .emit_error(|| JobEvent::finished(job.info(), started, Utc::now()), &error);
        Err(error)
    });

    let error = match result {
        Ok(()) => {
            shared.stats.completed.fetch_add(1, Ordering::Relaxed);
            return;
        }
        Err(error) => error,
    };

    let info = job.info();
    if job.core().retry_count() >= shared.config.max_retry_attempts {
        warn!(job = info.id, attempts = info.retry_count, %error, "dropping job");
        shared.observer.on_job_retry_max_reached(&info, &error);
        shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    debug!(job = info.id, attempt = info.retry_count, %error, "requeueing job");
    let mut state = shared.lock();
    state.queue.push(job);
    shared.stats.requeued.fetch_add(1, Ordering::Relaxed);
    shared.observer.on_job_requeued(&info);
    shared.work_available.notify_one();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
