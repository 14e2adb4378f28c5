//! File system primitives consumed by the write jobs
//!
//! Thin wrappers over `std::fs`, `filetime` and `xattr` that attach path
//! context to every failure.

use crate::error::{IoResultExt, Result, TransferError};
use std::fs::{File, OpenOptions, Permissions};
use std::path::Path;
use std::time::SystemTime;

/// How a file is opened for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create or truncate to zero length
    Truncate,
    /// Create if missing, keep existing contents
    CreateOrOpen,
}

/// Open a file for reading
pub fn open_read(path: &Path) -> Result<File> {
    File::open(path).with_path(path)
}

/// Open a file for writing
pub fn open_write(path: &Path, mode: WriteMode) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    match mode {
        WriteMode::Truncate => options.truncate(true),
        WriteMode::CreateOrOpen => options.truncate(false),
    };
    options.open(path).with_path(path)
}

/// Create a directory if it does not exist yet.
///
/// Returns `true` when this call created it. With `recursive` all missing
/// ancestors are created too.
pub fn ensure_directory(path: &Path, recursive: bool) -> Result<bool> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => return Ok(false),
        Ok(_) => {
            return Err(TransferError::InvalidPath(format!(
                "{} exists and is not a directory",
                path.display()
            )))
        }
        Err(_) => {}
    }

    let created = if recursive {
        std::fs::create_dir_all(path)
    } else {
        std::fs::create_dir(path)
    };

    match created {
        Ok(()) => Ok(true),
        // Lost a race against another worker
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(false),
        Err(e) => Err(TransferError::io(path, e)),
    }
}

/// Timestamps of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimestamps {
    /// Creation time, where the platform reports one
    pub created: Option<SystemTime>,
    /// Last access time
    pub accessed: SystemTime,
    /// Last write time
    pub modified: SystemTime,
}

/// Read the timestamps of a file
pub fn read_timestamps(path: &Path) -> Result<FileTimestamps> {
    let metadata = std::fs::metadata(path).with_path(path)?;
    let modified = metadata.modified().with_path(path)?;
    Ok(FileTimestamps {
        created: metadata.created().ok(),
        accessed: metadata.accessed().unwrap_or(modified),
        modified,
    })
}

/// Apply access and write times.
///
/// Creation time cannot be set portably and is left untouched.
pub fn set_timestamps(path: &Path, timestamps: &FileTimestamps) -> Result<()> {
    filetime::set_file_times(
        path,
        filetime::FileTime::from_system_time(timestamps.accessed),
        filetime::FileTime::from_system_time(timestamps.modified),
    )
    .with_path(path)
}

/// Attributes copied alongside file contents
#[derive(Debug, Clone)]
pub struct FileAttributes {
    /// Permission bits / read-only flag
    pub permissions: Permissions,
    /// Extended attributes (Unix only)
    pub xattrs: Vec<(std::ffi::OsString, Vec<u8>)>,
}

/// Read the attributes of a file
pub fn read_attributes(path: &Path) -> Result<FileAttributes> {
    let metadata = std::fs::metadata(path).with_path(path)?;
    Ok(FileAttributes {
        permissions: metadata.permissions(),
        xattrs: read_xattrs(path),
    })
}

/// Apply attributes to a file
pub fn set_attributes(path: &Path, attributes: &FileAttributes) -> Result<()> {
    write_xattrs(path, &attributes.xattrs);
    std::fs::set_permissions(path, attributes.permissions.clone()).with_path(path)
}

#[cfg(unix)]
fn read_xattrs(path: &Path) -> Vec<(std::ffi::OsString, Vec<u8>)> {
    let mut attrs = Vec::new();
    // Not every filesystem supports xattrs; their absence is not an error
    if let Ok(names) = xattr::list(path) {
        for name in names {
            if let Ok(Some(value)) = xattr::get(path, &name) {
                attrs.push((name, value));
            }
        }
    }
    attrs
}

#[cfg(not(unix))]
fn read_xattrs(_path: &Path) -> Vec<(std::ffi::OsString, Vec<u8>)> {
    Vec::new()
}

#[cfg(unix)]
fn write_xattrs(path: &Path, attrs: &[(std::ffi::OsString, Vec<u8>)]) {
    for (name, value) in attrs {
        if let Err(e) = xattr::set(path, name, value) {
            tracing::debug!("Skipping xattr {:?} on {}: {}", name, path.display(), e);
        }
    }
}

#[cfg(not(unix))]
fn write_xattrs(_path: &Path, _attrs: &[(std::ffi::OsString, Vec<u8>)]) {}
