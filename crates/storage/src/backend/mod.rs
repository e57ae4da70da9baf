//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for storage operations across different backends (local
//! filesystem, object-store services, etc.).

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod object_store;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::object_store::{parse_uri, ObjectStoreBackend};
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::io::Read;
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;
/// A `'static` boxed synchronous reader, suitable for use inside
/// [`spawn_blocking`](tokio::task::spawn_blocking).
pub type BoxSyncRead = Box<dyn Read + Send + 'static>;

/// Unified interface for storage backends.
///
/// All operations are asynchronous so that both local I/O and network calls
/// can be awaited uniformly. Paths passed to every method are relative to the
/// backend root and MUST be validated with
/// [`validate_path`](crate::validate_path) before use — implementations
/// enforce this themselves, callers don't need to pre-validate.
///
/// There is no `close()` method on this trait: both concrete backends here
/// release their resources synchronously on `Drop` (the object-store client
/// has no connection pool to drain, and the local backend holds no open
/// file handles between calls), so an explicit async teardown step would be
/// a no-op. A backend that does need one can still implement `Drop` itself.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// Stream file metadata matching an optional prefix.
    ///
    /// An empty or absent prefix means "everything this backend considers in
    /// scope" (the whole root directory / the whole bucket). Directory
    /// markers may or may not be present; entries with `is_dir = true` are
    /// advisory only — callers that care (the sync engine) must filter them.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// List all files matching an optional prefix.
    ///
    /// Default implementation collects [`list_stream()`](Self::list_stream)
    /// into a `Vec`.
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Open a file for streaming reads.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist. The returned reader is single-pass, not seekable.
    async fn read(&self, path: &Path) -> Result<BoxSyncRead>;

    /// Write the entirety of `reader` to `path`, creating any implicit
    /// parent directories.
    ///
    /// `size`, if known, is advisory — the object-store backend writes the
    /// full stream regardless of whether the caller supplied an accurate
    /// hint.
    async fn write(&self, path: &Path, reader: BoxSyncRead, size: Option<u64>) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}
