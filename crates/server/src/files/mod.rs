//! Confined access to the shared directory.
//!
//! This module provides the read-only file operations the service exposes:
//! - Path confinement against the shared root
//! - Directory listing, directories first
//! - Single-file retrieval
//! - Streaming ZIP archives of arbitrary files and folders
//!
//! # Security
//!
//! Every client path goes through [`SharedRoot::resolve`], which
//! canonicalizes it and rejects anything that does not end up inside the
//! shared directory. Symlinks are followed only when their targets stay
//! inside the share.

pub mod archive;
pub mod browser;
pub mod error;
pub mod pipe;
pub mod root;
pub mod transfer;

pub use archive::{ArchiveStreamer, ArchiveSummary, EntryOutcome};
pub use browser::{DirectoryBrowser, DirectoryEntry};
pub use error::FileError;
pub use pipe::ChannelWriter;
pub use root::{ResolvedPath, SharedRoot};
pub use transfer::{Download, FileTransfer, DEFAULT_CHUNK_SIZE};
