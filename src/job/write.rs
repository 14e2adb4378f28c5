//! Write concerns shared by the file and directory jobs

use crate::error::{IoResultExt, Result};
use crate::job::CancellationToken;
use std::io::{Read, Write};
use std::path::Path;

/// Smallest buffer a write job will use
pub const MIN_BUFFER_SIZE: usize = 1024;

/// Default upper bound for a single read/write chunk
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Overwrite policy, buffer size and parent self-healing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    overwrite: bool,
    max_buffer_size: usize,
    parent_existence_check: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            max_buffer_size: DEFAULT_BUFFER_SIZE,
            parent_existence_check: true,
        }
    }
}

impl WriteOptions {
    /// Default options: no overwrite, 1 MiB chunks, parents created on demand
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow replacing an existing target
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Upper bound for one chunk, never below [`MIN_BUFFER_SIZE`]
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size.max(MIN_BUFFER_SIZE);
        self
    }

    /// Create missing parent directories right before writing
    pub fn parent_existence_check(mut self, check: bool) -> Self {
        self.parent_existence_check = check;
        self
    }

    /// Whether an existing target may be replaced
    pub fn is_overwrite(&self) -> bool {
        self.overwrite
    }

    /// Effective chunk upper bound
    pub fn buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    /// Whether parents are created on demand
    pub fn checks_parent(&self) -> bool {
        self.parent_existence_check
    }

    /// Chunk size for a transfer of `total` bytes
    pub fn chunk_size(&self, total: u64) -> usize {
        if total == 0 {
            return MIN_BUFFER_SIZE;
        }
        usize::try_from(total)
            .map(|total| total.min(self.max_buffer_size))
            .unwrap_or(self.max_buffer_size)
    }
}

/// Copy `reader` into `writer` chunk by chunk.
///
/// The token is checked before every chunk; `progress` receives the
/// cumulative byte count after each one. Returns the bytes copied.
pub(crate) fn copy_chunks<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    token: &CancellationToken,
    paths: (&Path, &Path),
    mut progress: impl FnMut(u64),
) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let (source, target) = paths;
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut copied = 0u64;

    loop {
        token.check()?;
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).with_path(source),
        };
        writer.write_all(&buffer[..read]).with_path(target)?;
        copied += read as u64;
        progress(copied);
    }

    writer.flush().with_path(target)?;
    Ok(copied)
}
