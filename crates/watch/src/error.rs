//! Watcher error types.

use derive_more::{Display, Error};

/// A watcher error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// `Start` called on a watcher that is already active.
    #[display("watcher already active")]
    AlreadyActive,
    /// `Stop` called on a watcher that is not active.
    #[display("watcher not active")]
    NotActive,
    /// The initial recursive walk of the watched root failed.
    #[display("failed to walk {_0}")]
    Walk(#[error(not(source))] String),
    /// The underlying OS-level watch could not be established.
    #[display("failed to subscribe to {_0}")]
    Subscription(#[error(not(source))] String),
    /// An exclude pattern failed to compile.
    #[display("invalid exclude pattern {_0:?}")]
    InvalidPattern(#[error(not(source))] String),
    /// The sync engine invocation triggered by a quiet period failed.
    #[display("sync failed")]
    Sync,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Sync | Self::Subscription(_))
    }
}
