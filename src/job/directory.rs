//! Directory creation job

use super::{CancellationToken, Job, JobCore, JobKind, WriteOptions};
use crate::error::Result;
use crate::fs::ensure_directory;
use crate::observer::DirectoryEvent;
use std::path::{Path, PathBuf};

/// Default priority of directory jobs, ahead of file jobs
pub const DIRECTORY_PRIORITY: i32 = 1;

/// Create a directory if it does not exist
#[derive(Debug)]
pub struct DirectoryCreationJob {
    core: JobCore,
    target_path: PathBuf,
    options: WriteOptions,
}

impl DirectoryCreationJob {
    /// Create a job for `target_path`
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            core: JobCore::new(DIRECTORY_PRIORITY, CancellationToken::new()),
            target_path: target_path.into(),
            options: WriteOptions::default(),
        }
    }

    /// Set the write options; `parent_existence_check` makes the creation recursive
    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a shared cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.core.set_cancellation(token);
        self
    }

    /// Override the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.core.set_priority(priority);
        self
    }

    /// Directory to create
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    fn event(&self, created: bool) -> DirectoryEvent {
        DirectoryEvent {
            job_id: self.core.id(),
            path: self.target_path.clone(),
            created,
        }
    }
}

impl Job for DirectoryCreationJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut JobCore {
        &mut self.core
    }

    fn kind(&self) -> JobKind {
        JobKind::DirectoryCreation
    }

    fn describe(&self) -> String {
        format!("mkdir {}", self.target_path.display())
    }

    fn implementation(&mut self) -> Result<()> {
        self.core.cancellation().check()?;
        self.core
            .notify(|observer| observer.on_directory_creating(&self.event(false)));

        match ensure_directory(&self.target_path, self.options.checks_parent()) {
            Ok(created) => {
                self.core
                    .notify(|observer| observer.on_directory_created(&self.event(created)));
                Ok(())
            }
            Err(error) => {
                self.core
                    .notify(|observer| observer.on_directory_error(&self.event(false), &error));
                Err(error)
            }
        }
    }
}
