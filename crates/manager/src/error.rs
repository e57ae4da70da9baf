//! Watch manager error types.

use derive_more::{Display, Error};

/// A manager error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for manager operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// `Add`/`AddWatch` called with an `id` that already has a watch.
    #[display("watch {_0:?} already exists")]
    AlreadyExists(#[error(not(source))] String),
    /// `Remove`/`RemoveWatch`/`Get` called with an unknown `id`.
    #[display("watch {_0:?} not found")]
    NotFound(#[error(not(source))] String),
    /// A resolver failed to turn a configured path/URI into a backend.
    #[display("failed to resolve {_0:?}: {_1}")]
    Resolve(#[error(not(source))] String, #[error(not(source))] String),
    /// Starting the underlying `Watcher` failed.
    #[display("failed to start watch {_0:?}")]
    Start(#[error(not(source))] String),
    /// Stopping the underlying `Watcher` failed.
    #[display("failed to stop watch {_0:?}")]
    Stop(#[error(not(source))] String),
    /// Reading or writing the config store failed.
    #[display("config store operation failed: {_0}")]
    ConfigStore(#[error(not(source))] String),
}
