//! Transfer jobs
//!
//! [`Job`] is the schedulable unit; the write jobs here cover directory
//! creation, file copy, file creation from memory and (as a stub) timestamp
//! updates. [`CallbackJob`] wraps an arbitrary closure.

mod base;
mod cancel;
mod directory;
mod file_copy;
mod file_creation;
mod timestamps;
mod write;

pub use base::{CallbackJob, ErrorHandler, EventHandler, Job, JobCore, JobHandlers, JobId, JobKind};
pub use cancel::CancellationToken;
pub use directory::{DirectoryCreationJob, DIRECTORY_PRIORITY};
pub use file_copy::{FileCopyJob, FILE_PRIORITY};
pub use file_creation::FileCreationJob;
pub use timestamps::SetTimestampsJob;
pub use write::{WriteOptions, DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};
