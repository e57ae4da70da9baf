//! Config-store error types.

use derive_more::{Display, Error};

/// A config error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The record on disk (or the merged environment overlay) failed to
    /// parse or validate.
    #[display("malformed configuration: {_0}")]
    ConfigError(#[error(not(source))] String),
    /// Writing the serialized record back to disk failed.
    #[display("failed to write configuration: {_0}")]
    Io(#[error(not(source))] String),
}
