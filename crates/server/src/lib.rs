//! # LanShare Server Library
//!
//! This crate exposes one directory tree to the local network over HTTP.
//!
//! ## Overview
//!
//! Clients can:
//!
//! - **Browse**: list any directory inside the share, directories first
//! - **Download**: fetch a single file as a stream
//! - **Batch download**: fetch any mix of files and folders as one ZIP
//!   archive, streamed while it is built
//!
//! Every client path is confined to the shared directory; traversal,
//! absolute paths and symlinks leading out of the share are refused.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  HTTP router (axum)                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │  Directory   │  │     File     │  │    Archive     │  │
//! │  │   Browser    │  │   Transfer   │  │    Streamer    │  │
//! │  └──────────────┘  └──────────────┘  └────────────────┘  │
//! ├──────────────────────────────────────────────────────────┤
//! │             Shared Root (path confinement)               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use server::{Config, ShareServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let server = ShareServer::new(config)?;
//!
//!     let shutdown = CancellationToken::new();
//!     server.run(shutdown).await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Path confinement, listing, transfer, archives
//! - [`http`]: HTTP routes
//! - [`frontend`]: Optional browser UI assets
//! - [`app`]: Server lifecycle

pub mod app;
pub mod config;
pub mod files;
pub mod frontend;
pub mod http;

// Re-export protocol for convenience
pub use protocol;

pub use app::ShareServer;
pub use config::Config;
pub use files::{
    ArchiveStreamer, ArchiveSummary, DirectoryBrowser, DirectoryEntry, EntryOutcome, FileError,
    FileTransfer, SharedRoot,
};
