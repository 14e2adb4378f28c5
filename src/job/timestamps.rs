//! Timestamp update job
//!
//! Declared so plans can name it, but not implemented: every attempt fails
//! with [`TransferError::UnsupportedOperation`], which the scheduler drops
//! without retrying.

use super::{CancellationToken, Job, JobCore, JobKind, FILE_PRIORITY};
use crate::error::{Result, TransferError};
use crate::fs::FileTimestamps;
use std::path::PathBuf;

/// Apply timestamps to an existing file
#[derive(Debug)]
pub struct SetTimestampsJob {
    core: JobCore,
    target: PathBuf,
    timestamps: FileTimestamps,
}

impl SetTimestampsJob {
    /// Create the job
    pub fn new(target: impl Into<PathBuf>, timestamps: FileTimestamps) -> Self {
        Self {
            core: JobCore::new(FILE_PRIORITY, CancellationToken::new()),
            target: target.into(),
            timestamps,
        }
    }

    /// Timestamps this job would apply
    pub fn timestamps(&self) -> &FileTimestamps {
        &self.timestamps
    }
}

impl Job for SetTimestampsJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut JobCore {
        &mut self.core
    }

    fn kind(&self) -> JobKind {
        JobKind::SetTimestamps
    }

    fn describe(&self) -> String {
        format!("touch {}", self.target.display())
    }

    fn implementation(&mut self) -> Result<()> {
        self.core.cancellation().check()?;
        Err(TransferError::UnsupportedOperation(format!(
            "setting timestamps on {}",
            self.target.display()
        )))
    }
}
