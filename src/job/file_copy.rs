//! File copy job

use super::write::copy_chunks;
use super::{CancellationToken, Job, JobCore, JobKind, WriteOptions};
use crate::error::{IoResultExt, Result, TransferError};
use crate::fs::{
    ensure_directory, open_read, open_write, read_attributes, read_timestamps, set_attributes,
    set_timestamps, WriteMode,
};
use crate::observer::TransferProgress;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Default priority of file jobs
pub const FILE_PRIORITY: i32 = 0;

/// Copy one file, optionally with its timestamps and attributes
#[derive(Debug)]
pub struct FileCopyJob {
    core: JobCore,
    source: PathBuf,
    target: PathBuf,
    options: WriteOptions,
    copy_timestamps: bool,
    copy_attributes: bool,
    // Set once an attempt of this job has opened the target, so retries
    // may overwrite their own partial output.
    owns_target: bool,
}

impl FileCopyJob {
    /// Copy `source` to `target`
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            core: JobCore::new(FILE_PRIORITY, CancellationToken::new()),
            source: source.into(),
            target: target.into(),
            options: WriteOptions::default(),
            copy_timestamps: true,
            copy_attributes: true,
            owns_target: false,
        }
    }

    /// Set the write options
    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Copy accessed/modified times after the bytes
    pub fn copy_timestamps(mut self, enabled: bool) -> Self {
        self.copy_timestamps = enabled;
        self
    }

    /// Copy permissions and extended attributes after the bytes
    pub fn copy_attributes(mut self, enabled: bool) -> Self {
        self.copy_attributes = enabled;
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

    /// Source file
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Target file
    pub fn target(&self) -> &Path {
        &self.target
    }

    fn progress(&self, total_bytes: u64, bytes_transferred: u64, started: Instant) -> TransferProgress {
        TransferProgress {
            job_id: self.core.id(),
            source: Some(self.source.clone()),
            target: self.target.clone(),
            total_bytes,
            bytes_transferred,
            elapsed: started.elapsed(),
        }
    }

    fn copy(&mut self, started: Instant, total: &mut u64) -> Result<()> {
        let token = self.core.cancellation();
        token.check()?;

        if !self.options.is_overwrite() && !self.owns_target && self.target.exists() {
            return Err(TransferError::AlreadyExists(self.target.clone()));
        }

        let metadata = std::fs::metadata(&self.source).with_path(&self.source)?;
        *total = metadata.len();
        let total_bytes = *total;

        self.core.notify(|observer| {
            observer.on_file_copy_started(&self.progress(total_bytes, 0, started))
        });

        let mut reader = open_read(&self.source)?;
        if self.options.checks_parent() {
            if let Some(parent) = self.target.parent().filter(|p| !p.as_os_str().is_empty()) {
                ensure_directory(parent, true)?;
            }
        }

        {
            let mut writer = open_write(&self.target, WriteMode::Truncate)?;
            self.owns_target = true;
            copy_chunks(
                &mut reader,
                &mut writer,
                self.options.chunk_size(total_bytes),
                token,
                (&self.source, &self.target),
                |copied| {
                    self.core.emit_progress(
                        || self.progress(total_bytes, copied, started),
                        |observer, event| observer.on_file_copy_progress(event),
                    )
                },
            )?;
        }

        token.check()?;
        if self.copy_timestamps {
            let timestamps = read_timestamps(&self.source)?;
            set_timestamps(&self.target, &timestamps)?;
        }
        if self.copy_attributes {
            let attributes = read_attributes(&self.source)?;
            set_attributes(&self.target, &attributes)?;
        }

        self.core.notify(|observer| {
            observer.on_file_copy_finished(&self.progress(total_bytes, total_bytes, started))
        });
        Ok(())
    }
}

impl Job for FileCopyJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut JobCore {
        &mut self.core
    }

    fn kind(&self) -> JobKind {
        JobKind::FileCopy
    }

    fn describe(&self) -> String {
        format!("copy {} -> {}", self.source.display(), self.target.display())
    }

    fn implementation(&mut self) -> Result<()> {
        let started = Instant::now();
        let mut total = 0;
        self.copy(started, &mut total).inspect_err(|error| {
            self.core.notify(|observer| {
                observer.on_file_copy_error(&self.progress(total, 0, started), error)
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{EventRecorder, RecordedEvent};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn setup(contents: &[u8]) -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.bin");
        std::fs::write(&source, contents).unwrap();
        let target = temp.path().join("out/target.bin");
        (temp, source, target)
    }

    #[test]
    fn test_copies_bytes_and_creates_parent() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let (_temp, source, target) = setup(&data);
        let recorder = Arc::new(EventRecorder::new());

        let mut job = FileCopyJob::new(&source, &target)
            .with_options(WriteOptions::new().max_buffer_size(2048));
        job.core_mut().set_observer(Some(recorder.clone()));
        job.run().unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), data);
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::FileCopyProgress { .. })), 3);
        assert_eq!(
            recorder.position(|e| matches!(e, RecordedEvent::FileCopyStarted { .. })),
            Some(1)
        );
        assert!(matches!(
            recorder.events().last(),
            Some(RecordedEvent::JobEnd { .. })
        ));
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let (_temp, source, target) = setup(b"new");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, b"old").unwrap();
        let recorder = Arc::new(EventRecorder::new());

        let mut job = FileCopyJob::new(&source, &target);
        job.core_mut().set_observer(Some(recorder.clone()));

        assert!(matches!(job.run(), Err(TransferError::AlreadyExists(_))));
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
        assert_eq!(recorder.count(|e| matches!(e, RecordedEvent::FileCopyError { .. })), 1);
    }

    #[test]
    fn test_overwrite_replaces_target() {
        let (_temp, source, target) = setup(b"new");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, b"older contents").unwrap();

        let mut job = FileCopyJob::new(&source, &target)
            .with_options(WriteOptions::new().overwrite(true));
        job.run().unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn test_missing_parent_without_check_fails() {
        let (_temp, source, target) = setup(b"data");
        let mut job = FileCopyJob::new(&source, &target)
            .with_options(WriteOptions::new().parent_existence_check(false));

        let error = job.run().unwrap_err();
        assert!(error.is_retryable());
    }

    #[test]
    fn test_preserves_modified_time() {
        let (_temp, source, target) = setup(b"stamp");
        let past = filetime::FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(&source, past).unwrap();

        let mut job = FileCopyJob::new(&source, &target);
        job.run().unwrap();

        let metadata = std::fs::metadata(&target).unwrap();
        assert_eq!(filetime::FileTime::from_last_modification_time(&metadata), past);
    }

    #[test]
    fn test_local_progress_handler() {
        let (_temp, source, target) = setup(&[1u8; 3000]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut job = FileCopyJob::new(&source, &target)
            .with_options(WriteOptions::new().max_buffer_size(1024));
        job.core_mut()
            .handlers_mut()
            .on_progress(move |p| sink.lock().unwrap().push(p.bytes_transferred));
        job.run().unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), [1024, 2048, 3000]);
    }

    #[test]
    fn test_cancelled_before_start() {
        let (_temp, source, target) = setup(b"data");
        let token = CancellationToken::new();
        token.cancel();

        let mut job = FileCopyJob::new(&source, &target).with_cancellation(token);
        assert!(matches!(job.run(), Err(TransferError::Cancelled)));
        assert!(!target.exists());
    }
}
