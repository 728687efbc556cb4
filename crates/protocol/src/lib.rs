//! # LanShare Protocol Library
//!
//! Wire types for the LanShare local-network file-sharing service.
//!
//! ## Overview
//!
//! The server exposes one shared directory over HTTP. This crate holds the
//! JSON bodies and route constants both sides agree on:
//!
//! - **Listings**: [`FileEntry`] values, directories first
//! - **Batch downloads**: [`BatchDownloadRequest`] naming files and folders
//!   to stream back as one ZIP archive
//! - **Errors**: [`ErrorResponse`] with a stable [`ErrorCode`]
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{BatchDownloadRequest, ErrorCode};
//!
//! let request = BatchDownloadRequest::new(["photos", "notes.txt"]);
//! let body = request.to_json().unwrap();
//! assert_eq!(BatchDownloadRequest::from_json(&body).unwrap(), request);
//!
//! assert_eq!(ErrorCode::Forbidden.http_status(), 403);
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Request and response bodies, route constants
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{
    BatchDownloadRequest, ErrorCode, ErrorResponse, FileEntry, HealthStatus, API_VERSION,
    ARCHIVE_CONTENT_TYPE, BATCH_DOWNLOAD_ROUTE, DOWNLOAD_ROUTE, FILES_ROUTE, FILE_CONTENT_TYPE,
    HEALTH_ROUTE,
};
