//! Object-store storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! object stores: AWS S3, Backblaze B2, Tigris, MinIO, and others.
//!
//! # Credentials
//!
//! Credential *resolution* (where the access key/secret/profile actually come
//! from) is out of scope here. `ObjectStoreBackend::new` accepts
//! already-resolved key id/secret arguments; a caller-side config layer is
//! responsible for turning a `profile:name` or environment hint into these.

use crate::{
    backend::FileInfoStream,
    error::{ErrorKind, Result},
    validate_path, FileInfo, StorageBackend,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{retry::RetryConfig, BehaviorVersion, Credentials, Region},
    error::ProvideErrorMetadata,
    operation::{get_object::GetObjectError, head_object::HeadObjectError},
    primitives::{ByteStream, DateTime},
    Client,
};
use exn::{OptionExt, ResultExt};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent object-store requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// Object-store storage backend.
///
/// Stores files in a bucket, optionally under a key prefix. All paths passed
/// to this backend's methods are relative to the configured prefix, if any.
///
/// # Supported Services
///
/// - AWS S3
/// - Backblaze B2 (via S3-compatible API)
/// - Tigris (Fly.io storage)
/// - MinIO
/// - Other S3-compatible services
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent requests against the store.
    rate_limiter: Arc<Semaphore>,
}

impl ObjectStoreBackend {
    /// Create a new object-store backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging only)
    /// * `bucket` - Bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - Region (e.g. "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for non-AWS, S3-compatible services
    /// * `key_id` - Already-resolved access key id
    /// * `key_secret` - Already-resolved secret access key
    pub async fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix
            .map(validate_path)
            .transpose()?
            .map(|p| p.to_str().map(|s| s.to_string()).ok_or_raise(|| ErrorKind::InvalidPath(p)))
            .transpose()?;
        let name = name.into();
        let bucket = bucket.into();
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "drift-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        let client = Client::from_conf(config_builder.build());
        let rate_limiter = Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS));
        Ok(Self {
            name,
            client,
            bucket,
            prefix,
            rate_limiter,
        })
    }

    /// Construct the full object key from a relative path.
    fn full_key(&self, path: &Path) -> Result<String> {
        let validated = validate_path(path)?;
        let path_str = validated.to_string_lossy();
        Ok(match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), path_str),
            None => path_str.into_owned(),
        })
    }

    /// Strip the configured prefix from an object key to get a relative path.
    fn relative_path(&self, key: &str) -> Result<PathBuf> {
        let relative = match &self.prefix {
            Some(prefix) => {
                let prefix_normalized = prefix.trim_end_matches('/');
                key.strip_prefix(prefix_normalized).and_then(|s| s.strip_prefix('/')).unwrap_or(key)
            },
            None => key,
        };
        validate_path(relative)
    }

    /// Acquire a rate limiter permit before making an API call.
    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        // unwrap is safe: semaphore is never closed
        self.rate_limiter.clone().acquire_owned().await.unwrap()
    }

    fn parse_datetime(dt: &DateTime) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::BackendError("object-store datetime out of range".to_string()))
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let key_prefix = match prefix.map(|p| self.full_key(p)).transpose() {
            Ok(p) => p.unwrap_or_else(|| self.prefix.clone().unwrap_or_default()),
            Err(e) => return Box::pin(futures::stream::once(async move { Err(e) })),
        };
        Box::pin(stream! {
            let _permit = self.acquire_permit().await;
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&key_prefix)
                .into_paginator()
                .send();
            while let Some(page) = futures::StreamExt::next(&mut pages).await {
                let page = match page {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(exn::Exn::from(ErrorKind::BackendError(e.to_string())));
                        return;
                    }
                };
                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    // Directory markers end with the separator; the sync
                    // engine has no use for them and the object store never
                    // round-trips them through a real directory concept.
                    if key.ends_with('/') {
                        continue;
                    }
                    let relative = match self.relative_path(key) {
                        Ok(relative) => relative,
                        Err(e) => {
                            yield Err(e);
                            continue;
                        }
                    };
                    let size = object.size().unwrap_or(0).max(0) as u64;
                    let modified = match object.last_modified() {
                        Some(dt) => match Self::parse_datetime(dt) {
                            Ok(modified) => modified,
                            Err(e) => {
                                yield Err(e);
                                continue;
                            }
                        },
                        None => OffsetDateTime::UNIX_EPOCH,
                    };
                    let mut info = FileInfo::new(relative, size, modified);
                    info.etag = object.e_tag().map(|e| e.trim_matches('"').to_string());
                    info.storage_class = object.storage_class().map(|c| c.as_str().to_string());
                    yield Ok(info);
                }
            }
        })
    }

    async fn read(&self, path: &Path) -> Result<Box<dyn Read + Send + 'static>> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await;
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_get_error(e, path))?;
        let bytes = response
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network("failed to read response body".to_string()))?
            .into_bytes();
        Ok(Box::new(std::io::Cursor::new(bytes.to_vec())))
    }

    async fn write(&self, path: &Path, mut reader: Box<dyn Read + Send + 'static>, size: Option<u64>) -> Result<()> {
        let key = self.full_key(path)?;
        let buf = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
            let mut buf = match size {
                Some(size) => Vec::with_capacity(size as usize),
                None => Vec::new(),
            };
            reader.read_to_end(&mut buf)?;
            Ok(buf)
        })
        .await
        .map_err(|e| exn::Exn::from(ErrorKind::BackendError(e.to_string())))?
        .map_err(ErrorKind::Io)?;
        let _permit = self.acquire_permit().await;
        let body = ByteStream::from(buf);
        self.client.put_object().bucket(&self.bucket).key(&key).body(body).send().await.map_err(|e| {
            if e.code() == Some("RequestTimeout") {
                ErrorKind::Network(e.to_string())
            } else {
                ErrorKind::BackendError(e.to_string())
            }
        })?;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await;
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => {},
            Err(e) => return Err(map_head_error(e, path).into()),
        }
        self.client.delete_object().bucket(&self.bucket).key(&key).send().await.map_err(|e| {
            ErrorKind::BackendError(e.to_string())
        })?;
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await;
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_head_error(e, path))?;
        let size = response.content_length.unwrap_or(0).max(0) as u64;
        let modified = match response.last_modified {
            Some(ref dt) => Self::parse_datetime(dt)?,
            None => OffsetDateTime::UNIX_EPOCH,
        };
        let mut info = FileInfo::new(path.to_path_buf(), size, modified);
        info.etag = response.e_tag.map(|e| e.trim_matches('"').to_string());
        info.storage_class = response.storage_class.map(|c| c.as_str().to_string());
        Ok(info)
    }
}

fn map_head_error(e: aws_sdk_s3::error::SdkError<HeadObjectError>, path: &Path) -> ErrorKind {
    use aws_sdk_s3::error::SdkError;
    match &e {
        SdkError::ServiceError(s) if matches!(s.err(), HeadObjectError::NotFound(_)) => {
            ErrorKind::NotFound(path.to_path_buf())
        },
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ErrorKind::Network(e.to_string()),
        _ => ErrorKind::BackendError(e.to_string()),
    }
}

fn map_get_error(e: aws_sdk_s3::error::SdkError<GetObjectError>, path: &Path) -> ErrorKind {
    use aws_sdk_s3::error::SdkError;
    match &e {
        SdkError::ServiceError(s) if matches!(s.err(), GetObjectError::NoSuchKey(_)) => {
            ErrorKind::NotFound(path.to_path_buf())
        },
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ErrorKind::Network(e.to_string()),
        _ => ErrorKind::BackendError(e.to_string()),
    }
}

/// URI scheme identifying an object-store target.
pub const SCHEME: &str = "s3";

/// Parse an object-store URI of the form `s3://bucket[/key]` into
/// `(bucket, key)`. An absent key yields an empty string, not `None`.
///
/// # Errors
///
/// Returns [`ErrorKind::UriError`] if the scheme isn't [`SCHEME`], the
/// scheme separator is missing, or the bucket component is empty.
pub fn parse_uri(input: &str) -> Result<(String, String)> {
    let Some((scheme, rest)) = input.split_once("://") else {
        exn::bail!(ErrorKind::UriError(format!("missing scheme in {input:?}")));
    };
    if scheme != SCHEME {
        exn::bail!(ErrorKind::UriError(format!("unrecognized scheme {scheme:?} in {input:?}")));
    }
    let (bucket, key) = match rest.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (rest, ""),
    };
    if bucket.is_empty() {
        exn::bail!(ErrorKind::UriError(format!("empty bucket in {input:?}")));
    }
    Ok((bucket.to_string(), key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_key_without_prefix() {
        let prefix: Option<String> = None;
        let path = Path::new("Fandom/work.txt");
        let path_str = path.to_string_lossy();
        let result = match &prefix {
            Some(p) => format!("{}/{}", p.trim_end_matches('/'), path_str),
            None => path_str.into_owned(),
        };
        assert_eq!(result, "Fandom/work.txt");
    }

    #[test]
    fn test_full_key_with_trailing_slash_prefix() {
        let prefix = Some("library/".to_string());
        let path = Path::new("Fandom/work.txt");
        let path_str = path.to_string_lossy();
        let result = match &prefix {
            Some(p) => format!("{}/{}", p.trim_end_matches('/'), path_str),
            None => path_str.into_owned(),
        };
        assert_eq!(result, "library/Fandom/work.txt");
    }

    #[test]
    fn test_relative_path_with_prefix() {
        let prefix = Some("library".to_string());
        let key = "library/Fandom/work.txt";
        let relative = match &prefix {
            Some(p) => {
                let prefix_normalized = p.trim_end_matches('/');
                key.strip_prefix(prefix_normalized).and_then(|s| s.strip_prefix('/')).unwrap_or(key)
            },
            None => key,
        };
        assert_eq!(relative, "Fandom/work.txt");
    }

    #[test]
    fn test_parse_uri_with_key() {
        let (bucket, key) = parse_uri("s3://my-bucket/a/b/c.txt").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(key, "a/b/c.txt");
    }

    #[test]
    fn test_parse_uri_without_key() {
        let (bucket, key) = parse_uri("s3://my-bucket").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(key, "");
    }

    #[test]
    fn test_parse_uri_rejects_missing_scheme() {
        assert!(parse_uri("my-bucket/a/b").is_err());
    }

    #[test]
    fn test_parse_uri_rejects_empty_bucket() {
        assert!(parse_uri("s3:///key").is_err());
    }

    #[test]
    fn test_parse_uri_rejects_unrecognized_scheme() {
        assert!(parse_uri("http://x").is_err());
    }
}
