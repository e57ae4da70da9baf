//! In-memory storage backend for testing.

use super::{BoxSyncRead, FileInfoStream};
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::StorageBackend;

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Ideal for unit
/// tests that need a [`StorageBackend`] without filesystem or network
/// dependencies.
///
/// # Examples
///
/// ```
/// use drift_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("works/123.txt", b"hello".as_slice()),
/// ]);
/// assert!(backend.stat(Path::new("works/123.txt")).await.is_ok());
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, (OffsetDateTime, Vec<u8>)>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    ///
    /// # Example
    ///
    /// ```
    /// use drift_storage::backend::MockBackend;
    ///
    /// let backend = MockBackend::with_files([
    ///     ("one.txt", b"data file 1".as_slice()),
    ///     ("dir/two.txt", b"data file 2".as_slice()),
    /// ]);
    /// ```
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Check whether a path currently exists, without a full `stat()`.
    ///
    /// Not part of [`StorageBackend`] — a test convenience only.
    pub async fn contains(&self, path: &Path) -> bool {
        match validate_path(path) {
            Ok(p) => self.storage.read().await.contains_key(&p),
            Err(_) => false,
        }
    }

    fn file_info(path: &Path, size: u64, inserted: OffsetDateTime) -> FileInfo {
        FileInfo::new(path, size, inserted)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &[u8]); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let entries: Vec<(PathBuf, (OffsetDateTime, u64))> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(path, _)| match &validated_prefix {
                        Some(pfx) => path.starts_with(pfx),
                        None => true,
                    })
                    .map(|(path, (inserted, data))| (path.clone(), (*inserted, data.len() as u64)))
                    .collect()
            };
            for (path, (inserted, size)) in entries {
                yield Ok(Self::file_info(&path, size, inserted));
            }
        })
    }

    async fn read(&self, path: &Path) -> Result<BoxSyncRead> {
        let path = validate_path(path)?;
        let (_inserted, data) =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn write(&self, path: &Path, mut reader: BoxSyncRead, _size: Option<u64>) -> Result<()> {
        let path = validate_path(path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data).map_err(ErrorKind::Io)?;
        self.storage.write().await.insert(path, (OffsetDateTime::now_utc(), data));
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        let (inserted, data) = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(Self::file_info(&path, data.len() as u64, *inserted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write(Path::new("test.txt"), Box::new(std::io::Cursor::new(b"hello".to_vec())), None).await.unwrap();
        let mut reader = backend.read(Path::new("test.txt")).await.unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_with_files() {
        let backend = MockBackend::with_files([
            ("a/file.txt", b"compressed".as_slice()),
            ("b/file.txt", b"plain".as_slice()),
        ]);
        assert!(backend.contains(Path::new("a/file.txt")).await);
        assert!(backend.contains(Path::new("b/file.txt")).await);
        assert!(!backend.contains(Path::new("c/nope")).await);
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let backend = MockBackend::default();
        let err = backend.read(Path::new("missing.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MockBackend::default();
        backend.write(Path::new("file.txt"), Box::new(std::io::Cursor::new(b"data".to_vec())), None).await.unwrap();
        backend.delete(Path::new("file.txt")).await.unwrap();
        assert!(!backend.contains(Path::new("file.txt")).await);
        let err = backend.delete(Path::new("file.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stat() {
        let backend = MockBackend::default();
        backend.write(Path::new("file.txt"), Box::new(std::io::Cursor::new(b"12345".to_vec())), None).await.unwrap();
        let info = backend.stat(Path::new("file.txt")).await.unwrap();
        assert_eq!(info.path, PathBuf::from("file.txt"));
        assert_eq!(info.size, 5);
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let backend = MockBackend::with_files([
            ("Fandom1/work1.txt", b"a".as_slice()),
            ("Fandom1/work2.txt", b"b".as_slice()),
            ("Fandom2/work3.txt", b"c".as_slice()),
        ]);
        let files = backend.list(Some(Path::new("Fandom1"))).await.unwrap();
        assert_eq!(files.len(), 2);
        let paths: Vec<_> = files.iter().map(|f| &f.path).collect();
        assert!(paths.contains(&&PathBuf::from("Fandom1/work1.txt")));
        assert!(paths.contains(&&PathBuf::from("Fandom1/work2.txt")));
    }

    #[tokio::test]
    async fn test_list_all() {
        let backend = MockBackend::with_files([("a.txt", b"1".as_slice()), ("b.txt", b"2".as_slice())]);
        let files = backend.list(None).await.unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let backend = MockBackend::default();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend
            .write(Path::new("../escape"), Box::new(std::io::Cursor::new(b"bad".to_vec())), None)
            .await
            .is_err());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", b"bad".as_slice())]);
    }
}
