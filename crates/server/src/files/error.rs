//! Error taxonomy for shared-directory access.

use std::io;

use protocol::{ErrorCode, ErrorResponse};
use thiserror::Error;

/// Errors that can occur while accessing the shared directory.
///
/// Messages carry the path as the client sent it, never the host path.
#[derive(Debug, Error)]
pub enum FileError {
    /// The path resolves outside the shared directory.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The path does not exist, or is the wrong type for the operation.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unexpected IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FileError {
    /// Classify an IO error raised while touching `relative`.
    pub fn from_io(err: io::Error, relative: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound
            | io::ErrorKind::NotADirectory
            | io::ErrorKind::InvalidInput => FileError::NotFound(display_path(relative)),
            io::ErrorKind::PermissionDenied => FileError::Forbidden(display_path(relative)),
            _ => FileError::Io(err),
        }
    }

    /// The wire error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            FileError::Forbidden(_) => ErrorCode::Forbidden,
            FileError::NotFound(_) => ErrorCode::NotFound,
            FileError::Io(_) => ErrorCode::InternalError,
        }
    }

    /// Convert the error to a wire error body.
    pub fn to_error_response(&self) -> ErrorResponse {
        let detail = match self {
            // IO errors may name host paths
            FileError::Io(_) => "internal error while reading the shared directory".to_string(),
            other => other.to_string(),
        };
        ErrorResponse::new(self.error_code(), detail)
    }
}

/// Render a client path for messages, `/` standing for the shared root.
pub(crate) fn display_path(relative: &str) -> String {
    if relative.is_empty() {
        "/".to_string()
    } else {
        relative.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_not_found() {
        let err = FileError::from_io(io::ErrorKind::NotFound.into(), "docs/a.txt");
        assert!(matches!(err, FileError::NotFound(ref p) if p == "docs/a.txt"));
        assert_eq!(err.error_code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_from_io_permission_denied() {
        let err = FileError::from_io(io::ErrorKind::PermissionDenied.into(), "private");
        assert!(matches!(err, FileError::Forbidden(_)));
        assert_eq!(err.error_code(), ErrorCode::Forbidden);
    }

    #[test]
    fn test_from_io_other_is_io() {
        let err = FileError::from_io(io::Error::other("disk on fire"), "x");
        assert!(matches!(err, FileError::Io(_)));
        assert_eq!(err.error_code(), ErrorCode::InternalError);
    }

    #[test]
    fn test_empty_path_displays_as_root() {
        let err = FileError::from_io(io::ErrorKind::NotFound.into(), "");
        assert_eq!(err.to_string(), "not found: /");
    }

    #[test]
    fn test_io_error_response_hides_details() {
        let err = FileError::Io(io::Error::other("/srv/secret/path exploded"));
        let body = err.to_error_response();
        assert_eq!(body.code, ErrorCode::InternalError);
        assert!(!body.detail.contains("/srv/secret"));
    }

    #[test]
    fn test_error_response_keeps_client_path() {
        let body = FileError::Forbidden("../etc".to_string()).to_error_response();
        assert_eq!(body.code, ErrorCode::Forbidden);
        assert_eq!(body.detail, "forbidden: ../etc");
    }
}
