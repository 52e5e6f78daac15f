//! Error types for the store boundary and the filesystem contract.
//!
//! [`StoreError`] is what the object-store client raises; [`FsError`] is
//! what filesystem callers see.  [`FsError::from_store`] is the single
//! translation point, so every operation maps backend failures the same
//! way.  `FsError` implements [`axum::response::IntoResponse`] so the
//! delivery middleware can bubble failures straight out of a handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure raised by an object-store call.
///
/// Only three outcomes are distinguishable at the wire boundary; everything
/// else is carried as `Other` with the backend's message preserved.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key (or prefix) does not exist.
    #[error("object not found")]
    NotFound,

    /// The credentials or bucket policy rejected the call.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Any other backend failure, message preserved for diagnostics.
    #[error("{0}")]
    Other(String),
}

/// Result alias for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Filesystem-level failure exposed to callers of [`crate::fs::MediaFileSystem`].
#[derive(Debug, Error)]
pub enum FsError {
    /// The file or directory does not exist.
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// The store rejected the operation for credential/policy reasons.
    #[error("access denied: {message}")]
    AccessDenied { message: String },

    /// The operation is not supported by this filesystem.
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// A required argument was blank or malformed.  Raised before any
    /// network call is attempted.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// Any other storage failure.
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl FsError {
    /// Shorthand for a blank/invalid argument failure.
    pub fn invalid(message: impl Into<String>) -> Self {
        FsError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Translate a store failure for an operation on `path`.
    pub fn from_store(err: StoreError, path: &str) -> Self {
        match err {
            StoreError::NotFound => FsError::NotFound {
                path: path.to_string(),
            },
            StoreError::AccessDenied(message) => FsError::AccessDenied { message },
            StoreError::Other(message) => FsError::Storage { message },
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            FsError::NotFound { .. } => StatusCode::NOT_FOUND,
            FsError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            FsError::Unsupported { .. } => StatusCode::NOT_IMPLEMENTED,
            FsError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            FsError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for FsError {
    fn from(err: StoreError) -> Self {
        FsError::from_store(err, "")
    }
}

impl IntoResponse for FsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("filesystem error: {self}");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_translates_with_path() {
        let err = FsError::from_store(StoreError::NotFound, "a/b.txt");
        match err {
            FsError::NotFound { path } => assert_eq!(path, "a/b.txt"),
            other => panic!("unexpected translation: {other:?}"),
        }
    }

    #[test]
    fn test_store_other_preserves_message() {
        let err = FsError::from_store(StoreError::Other("boom".into()), "x");
        assert_eq!(err.to_string(), "storage failure: boom");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            FsError::NotFound { path: "p".into() }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            FsError::AccessDenied {
                message: "m".into()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            FsError::Unsupported {
                operation: "o".into()
            }
            .status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(FsError::invalid("m").status_code(), StatusCode::BAD_REQUEST);
    }
}
