//! File metadata returned by storage backends.

use std::path::PathBuf;
use time::OffsetDateTime;

/// Immutable snapshot of one object in a storage backend at list/stat time.
///
/// A `FileInfo` describes content as of the moment it was produced;
/// concurrent writes to the same path may render it stale by the time a
/// caller acts on it. Callers (notably the sync engine) must tolerate that.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    /// Relative path from the backend root, forward-slash separated.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last-modification timestamp. Not assumed to be comparable across
    /// backends with different clocks.
    pub mod_time: OffsetDateTime,
    /// Opaque content fingerprint. `None` means "not available". Equality of
    /// two `Some` etags from the *same* backend implies identical content;
    /// across backends it is only a hint, since algorithms may differ.
    pub etag: Option<String>,
    /// `true` for directory markers. Only ever produced by the local
    /// backend; the sync engine must ignore these.
    pub is_dir: bool,
    /// Backend-defined storage tier tag. Only meaningful for the object
    /// store; always `None` from the local backend.
    pub storage_class: Option<String>,
}

impl FileInfo {
    /// Build a `FileInfo` for a regular (non-directory) file.
    pub fn new(path: impl Into<PathBuf>, size: u64, mod_time: OffsetDateTime) -> Self {
        Self {
            path: path.into(),
            size,
            mod_time,
            etag: None,
            is_dir: false,
            storage_class: None,
        }
    }

    /// Build a `FileInfo` describing a directory marker.
    pub fn directory(path: impl Into<PathBuf>, mod_time: OffsetDateTime) -> Self {
        Self {
            path: path.into(),
            size: 0,
            mod_time,
            etag: None,
            is_dir: true,
            storage_class: None,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_storage_class(mut self, storage_class: impl Into<String>) -> Self {
        self.storage_class = Some(storage_class.into());
        self
    }
}
