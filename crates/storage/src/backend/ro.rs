//! Read-only storage backend decorator.
//!
//! Wraps any [`BackendHandle`](crate::BackendHandle) and turns mutating
//! operations into logged no-ops instead of failing the caller — useful for
//! a dry-run-shaped destination that still wants a real `list`/`read`/`stat`
//! view of what's there.

use async_trait::async_trait;
use std::path::Path;

use crate::backend::{BoxSyncRead, FileInfoStream};
use crate::error::Result;
use crate::file::FileInfo;
use crate::{BackendHandle, StorageBackend};

/// Wraps another backend and silently drops all write operations, logging
/// an [`info`](tracing::info) event instead of touching the inner backend.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}

impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn read(&self, path: &Path) -> Result<BoxSyncRead> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, _reader: BoxSyncRead, size: Option<u64>) -> Result<()> {
        tracing::info!(path = %path.display(), ?size, "skipping write, backend is read-only");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "skipping delete, backend is read-only");
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use std::io::Cursor;
    use std::sync::Arc;

    #[tokio::test]
    async fn write_is_a_no_op() {
        let inner: BackendHandle = Arc::new(MockBackend::default());
        let ro = ReadOnlyBackend::new(inner.clone());
        ro.write(Path::new("a.txt"), Box::new(Cursor::new(b"x".to_vec())), Some(1)).await.unwrap();
        assert!(inner.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_a_no_op() {
        let mock = MockBackend::with_files([("a.txt", b"x".as_slice())]);
        let inner: BackendHandle = Arc::new(mock);
        let ro = ReadOnlyBackend::new(inner.clone());
        ro.delete(Path::new("a.txt")).await.unwrap();
        assert_eq!(inner.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reads_pass_through() {
        let mock = MockBackend::with_files([("a.txt", b"hello".as_slice())]);
        let inner: BackendHandle = Arc::new(mock);
        let ro = ReadOnlyBackend::new(inner);
        let info = ro.stat(Path::new("a.txt")).await.unwrap();
        assert_eq!(info.size, 5);
    }
}
