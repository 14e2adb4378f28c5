//! # jobcopy - prioritized, retrying file-transfer jobs
//!
//! jobcopy runs transfer work (directory creation, file copy, file creation
//! from memory) as jobs on a bounded pool of worker threads. Jobs wait in a
//! priority queue, failed attempts are requeued up to a retry budget, and
//! every step of a job's, a worker's and the queue's life is reported to an
//! observer.
//!
//! ## Quick Start
//!
//! ```no_run
//! use jobcopy::config::CopyConfig;
//! use jobcopy::core::DirectoryCopyService;
//!
//! let config = CopyConfig::new("/source", "/destination");
//! let summary = DirectoryCopyService::new(config).start().unwrap();
//! summary.print_summary();
//! ```
//!
//! ## Driving the scheduler directly
//!
//! ```no_run
//! use jobcopy::config::SchedulerConfig;
//! use jobcopy::core::JobScheduler;
//! use jobcopy::job::{DirectoryCreationJob, FileCopyJob};
//! use jobcopy::observer::LoggingObserver;
//! use std::sync::Arc;
//!
//! let config = SchedulerConfig { max_worker_count: 4, max_retry_attempts: 3 };
//! let scheduler = JobScheduler::with_observer(config, Arc::new(LoggingObserver::new())).unwrap();
//!
//! scheduler.start().unwrap();
//! scheduler.add(Box::new(DirectoryCreationJob::new("/dst/logs"))).unwrap();
//! scheduler.add(Box::new(FileCopyJob::new("/src/app.log", "/dst/logs/app.log"))).unwrap();
//! scheduler.complete_adding();
//! scheduler.wait_for_finish().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod fs;
pub mod job;
pub mod observer;
pub mod progress;

// Re-export commonly used types
pub use config::{CopyConfig, SchedulerConfig};
pub use core::{CopySummary, DirectoryCopyService, JobScheduler};
pub use error::{Result, TransferError};
pub use observer::TransferObserver;
pub use progress::ProgressReporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use jobcopy::prelude::*;
    //! ```

    pub use crate::config::{CopyConfig, SchedulerConfig};
    pub use crate::core::{CopySummary, DirectoryCopyService, JobScheduler, Plan};
    pub use crate::error::{Result, TransferError};
    pub use crate::job::{
        CallbackJob, CancellationToken, DirectoryCreationJob, FileCopyJob, FileCreationJob, Job,
        WriteOptions,
    };
    pub use crate::observer::{
        EventRecorder, LoggingObserver, NoopObserver, ObserverSet, TransferObserver,
    };
    pub use crate::progress::ProgressReporter;
}
