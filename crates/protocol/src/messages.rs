//! Message definitions for the LanShare HTTP API.
//!
//! This module defines the JSON bodies exchanged between the server and its
//! clients. Paths on the wire are always relative to the shared directory and
//! use forward slashes, whatever the host's separator is.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Current API version, reported by the health endpoint.
pub const API_VERSION: u8 = 1;

/// Route prefix for directory listings.
pub const FILES_ROUTE: &str = "/api/files";

/// Route prefix for downloads.
pub const DOWNLOAD_ROUTE: &str = "/api/download";

/// Route for batch (archive) downloads.
pub const BATCH_DOWNLOAD_ROUTE: &str = "/api/download/batch";

/// Route for the health check.
pub const HEALTH_ROUTE: &str = "/api/health";

/// Content type of batch download responses.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Content type of single-file download responses.
pub const FILE_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// File Messages
// ============================================================================

/// A single file or directory entry in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Path relative to the shared directory, `/`-separated.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Size in bytes (0 for directories).
    #[serde(default)]
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    #[serde(default)]
    pub modified: u64,
}

/// Request body for a batch download.
///
/// Each path is resolved independently; paths that cannot be resolved are
/// left out of the archive instead of failing the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDownloadRequest {
    /// Paths relative to the shared directory.
    pub paths: Vec<String>,
}

impl BatchDownloadRequest {
    /// Create a request for the given paths.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ============================================================================
// Control Messages
// ============================================================================

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub detail: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

/// Error codes for common error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The path resolves outside the shared directory.
    Forbidden,
    /// The path does not exist or has the wrong type for the operation.
    NotFound,
    /// Invalid request or parameters.
    InvalidRequest,
    /// Server-side error.
    InternalError,
}

impl ErrorCode {
    /// HTTP status code conventionally used for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InvalidRequest => 400,
            Self::InternalError => 500,
        }
    }
}

/// Health check response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always `"ok"` when the server answers.
    pub status: String,
    /// API version.
    pub version: u8,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: API_VERSION,
        }
    }
}
