//! Local filesystem storage backend.
//!
//! Stores files under a directory on the local filesystem, using
//! [`tokio::fs`] for async setup and `std::fs`/[`walkdir`] for the blocking
//! work (hashing, directory walking) run inside
//! [`spawn_blocking`](tokio::task::spawn_blocking).

use async_stream::stream;
use async_trait::async_trait;
use md5::{Digest, Md5};
use std::io::Read;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use crate::backend::{BoxSyncRead, FileInfoStream};
use crate::error::ErrorKind;
use crate::{error::Result, path::validate as validate_path, FileInfo, StorageBackend};

/// Read files in 64 KiB chunks while hashing, so a multi-gigabyte file in the
/// tree doesn't get buffered in memory during a scan.
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem storage backend.
///
/// All paths passed to its methods are relative to the configured root
/// directory.
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local filesystem backend rooted at `root`.
    ///
    /// Creates `root` if it doesn't already exist.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidPath`] if `root` is not an absolute path.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root.to_path_buf()));
        }
        std::fs::create_dir_all(root).map_err(ErrorKind::Io)?;
        Ok(Self {
            name: name.into(),
            root: root.to_path_buf(),
        })
    }

    /// Resolve a relative storage path to an absolute filesystem path,
    /// rejecting traversal outside `root`.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path)?;
        Ok(self.root.join(validated))
    }

    /// Hash a file's contents, producing a lowercase hex MD5 digest, or
    /// `None` for an empty file.
    fn hash_file(path: &Path) -> std::io::Result<Option<String>> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Md5::new();
        let mut buf = [0u8; HASH_CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let read = file.read(&mut buf)?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
            total += read as u64;
        }
        if total == 0 {
            return Ok(None);
        }
        Ok(Some(format!("{:x}", hasher.finalize())))
    }

    fn walk(root: PathBuf, prefix: Option<PathBuf>) -> Result<Vec<FileInfo>> {
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(&root).follow_links(true) {
            let entry = entry.map_err(|e| {
                ErrorKind::Io(e.into_io_error().unwrap_or_else(|| std::io::Error::other("walk error")))
            })?;
            if entry.path() == root {
                continue;
            }
            let relative = entry.path().strip_prefix(&root).expect("entry under root");
            let relative = PathBuf::from(relative.to_string_lossy().replace('\\', "/"));
            if let Some(prefix) = &prefix {
                if !relative.starts_with(prefix) {
                    continue;
                }
            }
            let metadata = entry.metadata().map_err(|e| {
                ErrorKind::Io(e.into_io_error().unwrap_or_else(|| std::io::Error::other("metadata error")))
            })?;
            let modified = metadata
                .modified()
                .ok()
                .map(OffsetDateTime::from)
                .unwrap_or(OffsetDateTime::UNIX_EPOCH);
            if metadata.is_dir() {
                out.push(FileInfo::directory(relative, modified));
                continue;
            }
            let etag = Self::hash_file(entry.path()).map_err(ErrorKind::Io)?;
            let mut info = FileInfo::new(relative, metadata.len(), modified);
            info.etag = etag;
            out.push(info);
        }
        Ok(out)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let root = self.root.clone();
        let prefix = prefix.map(|p| p.to_path_buf());
        Box::pin(stream! {
            let joined = tokio::task::spawn_blocking(move || Self::walk(root, prefix)).await;
            let entries = match joined {
                Ok(Ok(entries)) => entries,
                Ok(Err(e)) => {
                    yield Err(e);
                    return;
                }
                Err(e) => {
                    yield Err(exn::Exn::from(ErrorKind::BackendError(e.to_string())));
                    return;
                }
            };
            for entry in entries {
                yield Ok(entry);
            }
        })
    }

    async fn read(&self, path: &Path) -> Result<BoxSyncRead> {
        let abs = self.absolute_path(path)?;
        let file = tokio::fs::File::open(&abs).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                exn::Exn::from(ErrorKind::NotFound(path.to_path_buf()))
            } else {
                exn::Exn::from(ErrorKind::Io(e))
            }
        })?;
        let std_file = file.into_std().await;
        Ok(Box::new(std_file))
    }

    async fn write(&self, path: &Path, mut reader: BoxSyncRead, _size: Option<u64>) -> Result<()> {
        let abs = self.absolute_path(path)?;
        let parent = abs.parent().map(|p| p.to_path_buf());
        let abs_for_blocking = abs.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            if let Some(parent) = parent {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::File::create(&abs_for_blocking)?;
            std::io::copy(&mut reader, &mut file)?;
            Ok(())
        })
        .await
        .map_err(|e| exn::Exn::from(ErrorKind::BackendError(e.to_string())))?
        .map_err(ErrorKind::Io)?;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let abs = self.absolute_path(path)?;
        tokio::fs::remove_file(&abs).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                exn::Exn::from(ErrorKind::NotFound(path.to_path_buf()))
            } else {
                exn::Exn::from(ErrorKind::Io(e))
            }
        })
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let abs = self.absolute_path(path)?;
        let metadata = tokio::fs::metadata(&abs).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                exn::Exn::from(ErrorKind::NotFound(path.to_path_buf()))
            } else {
                exn::Exn::from(ErrorKind::Io(e))
            }
        })?;
        let modified = metadata
            .modified()
            .ok()
            .map(OffsetDateTime::from)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        if metadata.is_dir() {
            return Ok(FileInfo::directory(path.to_path_buf(), modified));
        }
        let abs_for_hash = abs.clone();
        let etag = tokio::task::spawn_blocking(move || Self::hash_file(&abs_for_hash))
            .await
            .map_err(|e| exn::Exn::from(ErrorKind::BackendError(e.to_string())))?
            .map_err(ErrorKind::Io)?;
        let mut info = FileInfo::new(path.to_path_buf(), metadata.len(), modified);
        info.etag = etag;
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert_eq!(
            backend.absolute_path(Path::new("a/b.txt")).unwrap(),
            temp_dir.path().join("a/b.txt")
        );
        assert!(backend.absolute_path(Path::new("../etc/passwd")).is_err());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let data = b"Hello, world!".to_vec();
        backend
            .write(Path::new("test.txt"), Box::new(std::io::Cursor::new(data.clone())), Some(data.len() as u64))
            .await
            .unwrap();
        let mut reader = backend.read(Path::new("test.txt")).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend
            .write(Path::new("a/b/c/file.txt"), Box::new(std::io::Cursor::new(b"data".to_vec())), None)
            .await
            .unwrap();
        assert!(backend.stat(Path::new("a/b/c/file.txt")).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend
            .write(Path::new("file.txt"), Box::new(std::io::Cursor::new(b"data".to_vec())), None)
            .await
            .unwrap();
        backend.delete(Path::new("file.txt")).await.unwrap();
        let result = backend.delete(Path::new("file.txt")).await;
        let err = result.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stat() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let data = b"Hello, world!".to_vec();
        backend
            .write(Path::new("file.txt"), Box::new(std::io::Cursor::new(data.clone())), None)
            .await
            .unwrap();
        let info = backend.stat(Path::new("file.txt")).await.unwrap();
        assert_eq!(info.path, PathBuf::from("file.txt"));
        assert_eq!(info.size, data.len() as u64);
        assert!(!info.is_dir);
        assert!(info.etag.is_some());
        assert_eq!(info.etag.unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_stat_empty_file_omits_etag() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend
            .write(Path::new("empty.txt"), Box::new(std::io::Cursor::new(Vec::<u8>::new())), None)
            .await
            .unwrap();
        let info = backend.stat(Path::new("empty.txt")).await.unwrap();
        assert_eq!(info.size, 0);
        assert!(info.etag.is_none());
    }

    #[tokio::test]
    async fn test_list_returns_all_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        for name in ["a.txt", "b.txt", "c/d.txt"] {
            backend.write(Path::new(name), Box::new(std::io::Cursor::new(b"x".to_vec())), None).await.unwrap();
        }
        let files = backend.list(None).await.unwrap();
        let non_dir = files.iter().filter(|f| !f.is_dir).count();
        assert_eq!(non_dir, 3);
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("Fandom1/work1.txt"), Box::new(std::io::Cursor::new(b"a".to_vec())), None).await.unwrap();
        backend.write(Path::new("Fandom1/work2.txt"), Box::new(std::io::Cursor::new(b"b".to_vec())), None).await.unwrap();
        backend.write(Path::new("Fandom2/work3.txt"), Box::new(std::io::Cursor::new(b"c".to_vec())), None).await.unwrap();
        let fandom1_files: Vec<_> =
            backend.list(Some(Path::new("Fandom1"))).await.unwrap().into_iter().filter(|f| !f.is_dir).collect();
        assert_eq!(fandom1_files.len(), 2);
    }

    #[tokio::test]
    async fn test_path_security() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend
            .write(Path::new("../escape.txt"), Box::new(std::io::Cursor::new(b"bad".to_vec())), None)
            .await
            .is_err());
        assert!(backend.delete(Path::new("../../file")).await.is_err());
    }
}
