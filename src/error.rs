//! Error types for jobcopy
//!
//! A single error enum covers scheduler precondition violations, job
//! failures and configuration problems. Job failures are further
//! classified so the scheduler can tell a deterministic failure from one
//! worth retrying.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for jobcopy operations
#[derive(Error, Debug)]
pub enum TransferError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File or directory not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Target exists and the job may not overwrite it
    #[error("Target already exists: {0}")]
    AlreadyExists(PathBuf),

    /// Invalid path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Job aborted through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// A job was added after `complete_adding`
    #[error("Cannot add jobs: adding has been completed")]
    AddingCompleted,

    /// `wait_for_finish` was called before `complete_adding`
    #[error("Cannot wait for finish: adding has not been completed")]
    AddingNotCompleted,

    /// A copy is already running on this service instance
    #[error("A copy operation is already running")]
    AlreadyRunning,

    /// The enumerator produced an entry the plan builder cannot classify
    #[error("Unsupported entry type at '{path}': {entry_type}")]
    UnsupportedEntryType { path: PathBuf, entry_type: String },

    /// Unsupported operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Bad glob pattern handed to the enumerator
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Worker thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// A job panicked while running
    #[error("Job panicked: {0}")]
    JobPanicked(String),
}

impl TransferError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Failures that will repeat on every attempt
    pub fn is_deterministic(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists(_)
                | Self::Cancelled
                | Self::UnsupportedOperation(_)
                | Self::UnsupportedEntryType { .. }
                | Self::InvalidPath(_)
        )
    }

    /// Check if this error is worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::NotFound(_) | Self::JobPanicked(_))
    }

    /// Check if this error is a scheduler or service precondition violation
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::AddingCompleted | Self::AddingNotCompleted | Self::AlreadyRunning
        )
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::NotFound(path)
            | Self::AlreadyExists(path)
            | Self::UnsupportedEntryType { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for jobcopy operations
pub type Result<T> = std::result::Result<T, TransferError>;

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        TransferError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        TransferError::ConfigError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            let path = path.into();
            match e.kind() {
                std::io::ErrorKind::NotFound => TransferError::NotFound(path),
                _ => TransferError::io(path, e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TransferError::io("/test/path", io_err);
        assert_eq!(err.path(), Some(&PathBuf::from("/test/path")));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_with_path_maps_not_found() {
        let result: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = result.with_path("/missing").unwrap_err();
        assert!(matches!(err, TransferError::NotFound(ref p) if p == &PathBuf::from("/missing")));
    }

    #[test]
    fn test_error_classification() {
        assert!(TransferError::AlreadyExists(PathBuf::from("/x")).is_deterministic());
        assert!(TransferError::Cancelled.is_deterministic());
        assert!(!TransferError::Cancelled.is_retryable());
        assert!(TransferError::AddingCompleted.is_precondition());
        assert!(TransferError::AlreadyRunning.is_precondition());
        assert!(!TransferError::NotFound(PathBuf::from("/x")).is_deterministic());
    }
}
