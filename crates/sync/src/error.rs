//! Sync engine error types.
//!
//! Structured errors using `exn` for automatic location tracking, following
//! the same shape used across this workspace's other crates.

use derive_more::{Display, Error};

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Listing the source or destination backend failed.
    #[display("failed to list backend")]
    List,
    /// A per-file transfer (read from source, write to destination) failed.
    #[display("failed to transfer {_0}")]
    Transfer(#[error(not(source))] String),
    /// A deletion on the destination backend failed.
    #[display("failed to delete {_0}")]
    Delete(#[error(not(source))] String),
    /// The sync was cancelled before it completed.
    #[display("sync cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}
