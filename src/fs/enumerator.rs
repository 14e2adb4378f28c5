//! Directory tree enumeration
//!
//! The plan builder only needs a lazy stream of `(path, entry type)`
//! pairs. [`TreeEnumerator`] is that contract; [`WalkDirEnumerator`] is the
//! default implementation on top of `walkdir`.

use crate::error::{Result, TransferError};
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Classification of an enumerated entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// A directory
    Directory,
    /// A regular file
    File,
    /// A symbolic link that was not followed
    Symlink,
    /// Sockets, FIFOs, devices
    Other,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Directory => write!(f, "directory"),
            EntryType::File => write!(f, "file"),
            EntryType::Symlink => write!(f, "symlink"),
            EntryType::Other => write!(f, "other"),
        }
    }
}

/// A single enumerated entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Absolute (root-prefixed) path of the entry
    pub path: PathBuf,
    /// What kind of entry this is
    pub entry_type: EntryType,
    /// Size in bytes for files, 0 otherwise
    pub size: u64,
}

impl TreeEntry {
    /// Create a new entry
    pub fn new(path: impl Into<PathBuf>, entry_type: EntryType) -> Self {
        Self {
            path: path.into(),
            entry_type,
            size: 0,
        }
    }
}

/// How deep enumeration descends below the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumerationDepth {
    /// Direct children of the root only
    Shallow,
    /// The whole tree
    #[default]
    Recursive,
}

impl EnumerationDepth {
    /// Map a recursive flag onto a depth
    pub fn from_recursive(recursive: bool) -> Self {
        if recursive {
            Self::Recursive
        } else {
            Self::Shallow
        }
    }
}

/// Lazy, finite, non-restartable stream of entries
pub type TreeIter = Box<dyn Iterator<Item = Result<TreeEntry>> + Send>;

/// Source of directory-tree entries for the plan builder
pub trait TreeEnumerator: Send + Sync {
    /// Enumerate `root`, never yielding the root itself.
    ///
    /// `pattern` filters non-directory entries by glob. A missing root
    /// fails with [`TransferError::NotFound`].
    fn enumerate(
        &self,
        root: &Path,
        pattern: Option<&str>,
        depth: EnumerationDepth,
    ) -> Result<TreeIter>;
}

/// `walkdir` backed enumerator
#[derive(Debug, Clone, Default)]
pub struct WalkDirEnumerator {
    follow_symlinks: bool,
}

impl WalkDirEnumerator {
    /// Create an enumerator that reports symlinks as [`EntryType::Symlink`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow symbolic links and classify their targets instead
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    fn build_matcher(pattern: &str) -> Result<GlobMatcher> {
        Glob::new(pattern)
            .map(|glob| glob.compile_matcher())
            .map_err(|e| TransferError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }
}

impl TreeEnumerator for WalkDirEnumerator {
    fn enumerate(
        &self,
        root: &Path,
        pattern: Option<&str>,
        depth: EnumerationDepth,
    ) -> Result<TreeIter> {
        if !root.exists() {
            return Err(TransferError::NotFound(root.to_path_buf()));
        }

        let matcher = pattern.map(Self::build_matcher).transpose()?;

        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name();

        if depth == EnumerationDepth::Shallow {
            walker = walker.max_depth(1);
        }

        let root = root.to_path_buf();
        let entries = walker.into_iter().filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.clone());
                    let source = err.into_io_error().unwrap_or_else(|| {
                        std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop detected")
                    });
                    return Some(Err(TransferError::io(path, source)));
                }
            };

            let file_type = entry.file_type();
            let entry_type = if file_type.is_dir() {
                EntryType::Directory
            } else if file_type.is_file() {
                EntryType::File
            } else if file_type.is_symlink() {
                EntryType::Symlink
            } else {
                EntryType::Other
            };

            // Directories always pass so the skeleton is reproduced
            if entry_type != EntryType::Directory {
                if let Some(matcher) = &matcher {
                    let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                    if !matcher.is_match(relative) && !matcher.is_match(entry.file_name()) {
                        return None;
                    }
                }
            }

            let size = match entry_type {
                EntryType::File => entry.metadata().map(|m| m.len()).unwrap_or(0),
                _ => 0,
            };

            Some(Ok(TreeEntry {
                path: entry.into_path(),
                entry_type,
                size,
            }))
        });

        Ok(Box::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_tree(root: &Path) {
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/x.txt"), b"x").unwrap();
        fs::write(root.join("a/b/y.txt"), b"yy").unwrap();
        fs::write(root.join("a/b/z.log"), b"zzz").unwrap();
        fs::write(root.join("top.txt"), b"top").unwrap();
    }

    fn collect(iter: TreeIter) -> Vec<TreeEntry> {
        iter.collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_recursive_enumeration() {
        let dir = TempDir::new().unwrap();
        create_tree(dir.path());

        let entries = collect(
            WalkDirEnumerator::new()
                .enumerate(dir.path(), None, EnumerationDepth::Recursive)
                .unwrap(),
        );

        let dirs = entries.iter().filter(|e| e.entry_type == EntryType::Directory).count();
        let files = entries.iter().filter(|e| e.entry_type == EntryType::File).count();
        assert_eq!(dirs, 2);
        assert_eq!(files, 4);
        assert!(entries.iter().all(|e| e.path != dir.path()));

        let y = entries.iter().find(|e| e.path.ends_with("a/b/y.txt")).unwrap();
        assert_eq!(y.size, 2);
    }

    #[test]
    fn test_shallow_enumeration() {
        let dir = TempDir::new().unwrap();
        create_tree(dir.path());

        let entries = collect(
            WalkDirEnumerator::new()
                .enumerate(dir.path(), None, EnumerationDepth::Shallow)
                .unwrap(),
        );

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.path.ends_with("a")));
        assert!(entries.iter().any(|e| e.path.ends_with("top.txt")));
    }

    #[test]
    fn test_pattern_filters_files_only() {
        let dir = TempDir::new().unwrap();
        create_tree(dir.path());

        let entries = collect(
            WalkDirEnumerator::new()
                .enumerate(dir.path(), Some("*.txt"), EnumerationDepth::Recursive)
                .unwrap(),
        );

        assert!(entries.iter().all(|e| !e.path.ends_with("z.log")));
        assert_eq!(
            entries.iter().filter(|e| e.entry_type == EntryType::Directory).count(),
            2
        );
        assert_eq!(
            entries.iter().filter(|e| e.entry_type == EntryType::File).count(),
            3
        );
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        let result = WalkDirEnumerator::new().enumerate(
            &dir.path().join("nope"),
            None,
            EnumerationDepth::Recursive,
        );
        assert!(matches!(result, Err(TransferError::NotFound(_))));
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let result =
            WalkDirEnumerator::new().enumerate(dir.path(), Some("a[b"), EnumerationDepth::Recursive);
        assert!(matches!(result, Err(TransferError::InvalidPattern { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_classification() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real.txt"), b"data").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt")).unwrap();

        let entries = collect(
            WalkDirEnumerator::new()
                .enumerate(dir.path(), None, EnumerationDepth::Recursive)
                .unwrap(),
        );
        let link = entries.iter().find(|e| e.path.ends_with("link.txt")).unwrap();
        assert_eq!(link.entry_type, EntryType::Symlink);

        let followed = collect(
            WalkDirEnumerator::new()
                .follow_symlinks(true)
                .enumerate(dir.path(), None, EnumerationDepth::Recursive)
                .unwrap(),
        );
        let link = followed.iter().find(|e| e.path.ends_with("link.txt")).unwrap();
        assert_eq!(link.entry_type, EntryType::File);
    }
}
