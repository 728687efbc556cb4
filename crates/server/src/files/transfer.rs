//! Single-file retrieval from the shared directory.

use std::fs::{self, File};
use std::sync::Arc;

use tracing::debug;

use super::error::{display_path, FileError};
use super::root::{ResolvedPath, SharedRoot};

/// Default chunk size for streamed transfers (64KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// An opened file ready to be streamed to a client.
#[derive(Debug)]
pub struct Download {
    /// Open handle positioned at the start of the file.
    pub file: File,
    /// Base name offered to the client.
    pub file_name: String,
    /// Size in bytes at the time the file was opened.
    pub size: u64,
    /// Where the file lives.
    pub path: ResolvedPath,
}

/// File transfer handler.
///
/// Opens regular files inside the shared directory for download. Framing
/// the bytes as a response is up to the caller.
#[derive(Debug, Clone)]
pub struct FileTransfer {
    root: Arc<SharedRoot>,
}

impl FileTransfer {
    /// Create a new file transfer handler.
    pub fn new(root: Arc<SharedRoot>) -> Self {
        Self { root }
    }

    /// Open a file for download.
    ///
    /// Directories and special files are reported as not found, so a
    /// directory can never be streamed as if it were file contents.
    pub fn open(&self, relative: &str) -> Result<Download, FileError> {
        let path = self.root.resolve(relative)?;

        let metadata = fs::metadata(path.as_path()).map_err(|e| FileError::from_io(e, relative))?;
        if !metadata.is_file() {
            return Err(FileError::NotFound(format!(
                "not a file: {}",
                display_path(relative)
            )));
        }

        let file = File::open(path.as_path()).map_err(|e| FileError::from_io(e, relative))?;
        // Size of the handle we actually hold, not of the earlier stat
        let size = file.metadata().map(|m| m.len()).unwrap_or(metadata.len());

        let file_name = path
            .file_name()
            .unwrap_or_else(|| self.root.name());

        debug!(path = %path.relative(), size, "Opened file for download");

        Ok(Download {
            file,
            file_name,
            size,
            path,
        })
    }
}
