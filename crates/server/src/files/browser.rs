//! Directory browsing inside the shared directory.
//!
//! Listings are produced fresh on every call. Directories sort before files,
//! and names compare case-insensitively within each group; clients rely on
//! that order for stable rendering.

use std::cmp::Ordering;
use std::fs;
use std::sync::Arc;
use std::time::SystemTime;

use protocol::FileEntry;
use tracing::{debug, trace};

use super::error::{display_path, FileError};
use super::root::SharedRoot;

/// A directory entry with metadata.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Path relative to the shared directory, `/`-separated.
    pub path: String,
    /// Whether the entry (or the symlink's target) is a directory.
    pub is_directory: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modified timestamp.
    pub modified: SystemTime,
    /// Whether this is a symbolic link.
    pub is_symlink: bool,
}

impl DirectoryEntry {
    /// Convert to protocol FileEntry.
    pub fn to_protocol(&self) -> FileEntry {
        let modified = self
            .modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        FileEntry {
            name: self.name.clone(),
            path: self.path.clone(),
            is_directory: self.is_directory,
            size: self.size,
            modified,
        }
    }
}

/// Directory browser confined to the shared directory.
#[derive(Debug, Clone)]
pub struct DirectoryBrowser {
    root: Arc<SharedRoot>,
}

impl DirectoryBrowser {
    /// Create a browser over the given shared root.
    pub fn new(root: Arc<SharedRoot>) -> Self {
        Self { root }
    }

    /// The shared root this browser lists.
    pub fn root(&self) -> &SharedRoot {
        &self.root
    }

    /// List the immediate children of a directory.
    ///
    /// `relative` is the client path; the empty string lists the shared
    /// directory itself. Children that cannot be read, and symlinks that
    /// point outside the share or nowhere, are left out.
    pub fn list_directory(&self, relative: &str) -> Result<Vec<DirectoryEntry>, FileError> {
        let dir = self.root.resolve(relative)?;

        let metadata = fs::metadata(dir.as_path()).map_err(|e| FileError::from_io(e, relative))?;
        if !metadata.is_dir() {
            return Err(FileError::NotFound(format!(
                "not a directory: {}",
                display_path(relative)
            )));
        }

        let entries = fs::read_dir(dir.as_path()).map_err(|e| FileError::from_io(e, relative))?;

        let mut results = Vec::new();

        for entry_result in entries {
            let entry = match entry_result {
                Ok(e) => e,
                Err(_) => continue,
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let child = entry.path();

            let is_symlink = entry
                .file_type()
                .map(|t| t.is_symlink())
                .unwrap_or(false);

            if is_symlink {
                let inside = fs::canonicalize(&child)
                    .map(|target| self.root.contains(&target))
                    .unwrap_or(false);
                if !inside {
                    trace!(name = %name, "Hiding symlink that leaves the shared root");
                    continue;
                }
            }

            // Follows symlinks so links are classified by their target
            let metadata = match fs::metadata(&child) {
                Ok(m) => m,
                Err(_) => continue,
            };

            let Some(path) = self.root.relative_wire_path(&child) else {
                continue;
            };

            let is_directory = metadata.is_dir();
            results.push(DirectoryEntry {
                name,
                path,
                is_directory,
                size: if metadata.is_file() { metadata.len() } else { 0 },
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                is_symlink,
            });
        }

        sort_entries(&mut results);

        debug!(path = %display_path(relative), count = results.len(), "Listed directory");
        Ok(results)
    }
}

/// Sort directories first, then case-insensitively by name.
pub fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|a, b| match (a.is_directory, b.is_directory) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    });
}
