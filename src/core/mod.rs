//! Core engine module
//!
//! The priority job queue, the worker pool that drains it, and the
//! directory copy service that plans jobs from a source tree.

mod copier;
mod queue;
mod scheduler;
mod worker;

pub use copier::*;
pub use queue::JobQueue;
pub use scheduler::{JobScheduler, SchedulerStats, StatsSnapshot};
pub use worker::WorkerState;
