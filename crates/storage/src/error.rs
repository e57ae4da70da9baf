//! Storage error types.
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, following the same shape used across this workspace's
//! other crates.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Object does not exist.
    #[display("not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied (permissions or credentials).
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Network-related error (object store connections, timeouts).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Path contains invalid characters or escapes the backend root.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Backend-specific error that doesn't fit another category.
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
    /// Object-store URI could not be parsed.
    #[display("invalid object-store URI: {_0}")]
    UriError(#[error(not(source))] String),
    /// The calling context was cancelled before the operation completed.
    #[display("operation cancelled")]
    Cancelled,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::BackendError(_))
    }
}
