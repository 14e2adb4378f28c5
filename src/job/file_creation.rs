//! File creation job: writes an in-memory payload

use super::write::copy_chunks;
use super::{CancellationToken, Job, JobCore, JobKind, WriteOptions, FILE_PRIORITY};
use crate::error::{Result, TransferError};
use crate::fs::{ensure_directory, open_write, WriteMode};
use crate::observer::TransferProgress;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Write `contents` to `target_directory/file_name`
#[derive(Debug)]
pub struct FileCreationJob {
    core: JobCore,
    target_directory: PathBuf,
    file_name: String,
    contents: Vec<u8>,
    options: WriteOptions,
    owns_target: bool,
}

impl FileCreationJob {
    /// Create a job writing `contents`
    pub fn new(
        target_directory: impl Into<PathBuf>,
        file_name: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            core: JobCore::new(FILE_PRIORITY, CancellationToken::new()),
            target_directory: target_directory.into(),
            file_name: file_name.into(),
            contents: contents.into(),
            options: WriteOptions::default(),
            owns_target: false,
        }
    }

    /// Set the write options
    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a shared cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.core.set_cancellation(token);
        self
    }

    /// Full path of the file to create
    pub fn target(&self) -> PathBuf {
        self.target_directory.join(&self.file_name)
    }

    fn progress(&self, target: &Path, bytes_transferred: u64, started: Instant) -> TransferProgress {
        TransferProgress {
            job_id: self.core.id(),
            source: None,
            target: target.to_path_buf(),
            total_bytes: self.contents.len() as u64,
            bytes_transferred,
            elapsed: started.elapsed(),
        }
    }

    fn create(&mut self, target: &Path, started: Instant) -> Result<()> {
        let token = self.core.cancellation();
        token.check()?;

        if self.file_name.is_empty() || Path::new(&self.file_name).components().count() != 1 {
            return Err(TransferError::InvalidPath(format!(
                "'{}' is not a plain file name",
                self.file_name
            )));
        }
        if !self.options.is_overwrite() && !self.owns_target && target.exists() {
            return Err(TransferError::AlreadyExists(target.to_path_buf()));
        }

        self.core
            .notify(|observer| observer.on_file_creation_started(&self.progress(target, 0, started)));

        if self.options.checks_parent() {
            ensure_directory(&self.target_directory, true)?;
        }

        let total = self.contents.len() as u64;
        let mut writer = open_write(target, WriteMode::Truncate)?;
        self.owns_target = true;
        copy_chunks(
            &mut Cursor::new(self.contents.as_slice()),
            &mut writer,
            self.options.chunk_size(total),
            token,
            (target, target),
            |written| {
                self.core.emit_progress(
                    || self.progress(target, written, started),
                    |observer, event| observer.on_file_creation_progress(event),
                )
            },
        )?;
        drop(writer);

        self.core.notify(|observer| {
            observer.on_file_creation_finished(&self.progress(target, total, started))
        });
        Ok(())
    }
}

impl Job for FileCreationJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut JobCore {
        &mut self.core
    }

    fn kind(&self) -> JobKind {
        JobKind::FileCreation
    }

    fn describe(&self) -> String {
        format!("create {} ({} bytes)", self.target().display(), self.contents.len())
    }

    fn implementation(&mut self) -> Result<()> {
        let started = Instant::now();
        let target = self.target();
        self.create(&target, started).inspect_err(|error| {
            self.core.notify(|observer| {
                observer.on_file_creation_error(&self.progress(&target, 0, started), error)
            });
        })
    }
}
