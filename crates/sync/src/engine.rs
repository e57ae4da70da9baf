//! The differential sync engine: list both sides, plan a diff, apply it.

use crate::error::{Error, ErrorKind, Result};
use crate::options::SyncOptions;
use crate::progress::{self, ProgressUpdate};
use drift_storage::{BackendHandle, FileInfo};
use exn::ResultExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Outcome counters for one completed [`SyncEngine::sync`] call.
///
/// Mirrors `WatchStatus`'s monotonic counters so a caller (the watcher) can
/// fold these directly into its running totals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub files_synced: u64,
    pub bytes_synced: u64,
    pub files_deleted: u64,
}

/// Given two storage backends and path prefixes, computes a diff and applies
/// it with bounded concurrency.
///
/// Stateless: a single `SyncEngine` can be reused (and shared via `&self`)
/// across any number of `sync` calls with different backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncEngine;

impl SyncEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one sync from `source` to `destination`.
    ///
    /// `source_prefix`/`destination_prefix` scope each side to a sub-tree;
    /// `None` means the whole backend. See module docs for the diff and
    /// apply algorithm.
    #[instrument(skip_all, fields(source = source.name(), destination = destination.name()))]
    pub async fn sync(
        &self,
        source: &BackendHandle,
        destination: &BackendHandle,
        source_prefix: Option<&Path>,
        destination_prefix: Option<&Path>,
        options: &SyncOptions,
        cancel: CancellationToken,
    ) -> Result<SyncSummary> {
        if cancel.is_cancelled() {
            exn::bail!(ErrorKind::Cancelled);
        }

        let (source_entries, destination_entries) = tokio::select! {
            _ = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
            result = list_both(source, destination, source_prefix, destination_prefix) => result?,
        };

        let mut destination_by_key: HashMap<PathBuf, FileInfo> = destination_entries
            .into_iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| (relative_key(&entry.path, destination_prefix), entry))
            .collect();

        let mut to_transfer: Vec<(PathBuf, FileInfo)> = Vec::new();
        for entry in source_entries.into_iter().filter(|entry| !entry.is_dir) {
            let key = relative_key(&entry.path, source_prefix);
            match destination_by_key.remove(&key) {
                Some(existing) if !needs_sync(&entry, &existing) => {
                    progress::emit(options.progress.as_ref(), ProgressUpdate::skip(key.display().to_string()));
                },
                _ => to_transfer.push((key, entry)),
            }
        }

        // What's left in `destination_by_key` exists only on the destination.
        let to_delete: Vec<PathBuf> = destination_by_key.into_keys().collect();

        progress::emit(
            options.progress.as_ref(),
            ProgressUpdate::summary(format!(
                "{} to sync, {} to delete",
                to_transfer.len(),
                if options.delete { to_delete.len() } else { 0 }
            )),
        );

        if options.dry_run {
            debug!(planned_transfers = to_transfer.len(), planned_deletions = to_delete.len(), "dry run, no mutation");
            return Ok(SyncSummary::default());
        }

        let transfer_outcome =
            apply_transfers(source, destination, source_prefix, destination_prefix, to_transfer, options, cancel.clone())
                .await;

        let mut files_deleted = 0u64;
        let mut delete_err = None;
        if options.delete {
            for key in to_delete {
                if cancel.is_cancelled() {
                    delete_err = Some(exn::Exn::from(ErrorKind::Cancelled));
                    break;
                }
                let dest_path = join_prefix(destination_prefix, &key);
                match destination.delete(&dest_path).await {
                    Ok(()) => {
                        files_deleted += 1;
                        progress::emit(options.progress.as_ref(), ProgressUpdate::delete(dest_path.display().to_string()));
                    },
                    Err(e) => {
                        warn!(path = %dest_path.display(), error = %e, "delete failed, aborting delete phase");
                        progress::emit(
                            options.progress.as_ref(),
                            ProgressUpdate::error(dest_path.display().to_string(), e.to_string()),
                        );
                        delete_err = Some(e.or_raise(|| ErrorKind::Delete(dest_path.display().to_string())));
                        break;
                    },
                }
            }
        }

        let (files_synced, bytes_synced, transfer_err) = transfer_outcome;
        let summary = SyncSummary { files_synced, bytes_synced, files_deleted };

        // Transfers run before deletions in the documented algorithm, so a
        // transfer error takes priority if both phases failed.
        match (transfer_err, delete_err) {
            (Some(err), _) => Err(err),
            (None, Some(err)) => Err(err),
            (None, None) => Ok(summary),
        }
    }
}

async fn list_both(
    source: &BackendHandle,
    destination: &BackendHandle,
    source_prefix: Option<&Path>,
    destination_prefix: Option<&Path>,
) -> Result<(Vec<FileInfo>, Vec<FileInfo>)> {
    let (source_result, destination_result) =
        tokio::join!(source.list(source_prefix), destination.list(destination_prefix));
    let source_entries = source_result.or_raise(|| ErrorKind::List)?;
    let destination_entries = destination_result.or_raise(|| ErrorKind::List)?;
    Ok((source_entries, destination_entries))
}

/// Strip `prefix` from `path` to get the key the two backends are joined on.
/// Falls back to the untouched path if it doesn't actually start with
/// `prefix` (defensive; every entry here came from listing under that exact
/// prefix, so this should never trigger).
fn relative_key(path: &Path, prefix: Option<&Path>) -> PathBuf {
    match prefix {
        None => path.to_path_buf(),
        Some(prefix) => path.strip_prefix(prefix).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf()),
    }
}

fn join_prefix(prefix: Option<&Path>, relative: &Path) -> PathBuf {
    match prefix {
        None => relative.to_path_buf(),
        Some(prefix) => prefix.join(relative),
    }
}

/// Whether `src` needs to be (re)transferred to overwrite `dst`.
///
/// See module-level docs and `SPEC_FULL.md` §4.4 for the tie-break rationale:
/// ETags are authoritative when both sides have one; size-then-mtime is a
/// fallback that biases toward "don't resync" under uncertainty.
fn needs_sync(src: &FileInfo, dst: &FileInfo) -> bool {
    match (src.etag.as_deref(), dst.etag.as_deref()) {
        (Some(s), Some(d)) if !s.is_empty() && !d.is_empty() => s != d,
        _ => src.size != dst.size || src.mod_time > dst.mod_time,
    }
}

/// Transfer every `(relative_key, source FileInfo)` pair concurrently, bounded
/// by `options.concurrency` (or the default). Returns `(files, bytes, first_error)`
/// — the pool always drains fully regardless of per-file errors.
async fn apply_transfers(
    source: &BackendHandle,
    destination: &BackendHandle,
    source_prefix: Option<&Path>,
    destination_prefix: Option<&Path>,
    entries: Vec<(PathBuf, FileInfo)>,
    options: &SyncOptions,
    cancel: CancellationToken,
) -> (u64, u64, Option<Error>) {
    let semaphore = Arc::new(Semaphore::new(options.resolved_concurrency()));
    let mut handles = Vec::with_capacity(entries.len());
    for (key, info) in entries {
        let semaphore = semaphore.clone();
        let source = source.clone();
        let destination = destination.clone();
        let progress = options.progress.clone();
        let cancel = cancel.clone();
        let source_path = join_prefix(source_prefix, &key);
        let destination_path = join_prefix(destination_prefix, &key);
        let size = info.size;
        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Err(exn::Exn::from(ErrorKind::Cancelled)),
            };
            transfer_one(&source, &destination, &source_path, &destination_path, size, progress.as_ref(), &cancel).await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let mut files_synced = 0u64;
    let mut bytes_synced = 0u64;
    let mut first_err = None;
    for result in results {
        match result {
            Ok(Ok(bytes)) => {
                files_synced += 1;
                bytes_synced += bytes;
            },
            Ok(Err(e)) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            },
            Err(join_error) => {
                if first_err.is_none() {
                    first_err = Some(exn::Exn::from(ErrorKind::Transfer(join_error.to_string())));
                }
            },
        }
    }
    (files_synced, bytes_synced, first_err)
}

async fn transfer_one(
    source: &BackendHandle,
    destination: &BackendHandle,
    source_path: &Path,
    destination_path: &Path,
    size: u64,
    progress: Option<&crate::progress::ProgressSender>,
    cancel: &CancellationToken,
) -> Result<u64> {
    progress::emit(progress, ProgressUpdate::upload_started(destination_path.display().to_string(), size));

    let label = || destination_path.display().to_string();
    let reader = tokio::select! {
        _ = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
        result = source.read(source_path) => result.or_raise(|| ErrorKind::Transfer(label()))?,
    };

    let write_result = tokio::select! {
        _ = cancel.cancelled() => Err(exn::Exn::from(ErrorKind::Cancelled)),
        result = destination.write(destination_path, reader, Some(size)) => {
            result.or_raise(|| ErrorKind::Transfer(label()))
        },
    };

    match write_result {
        Ok(()) => {
            progress::emit(progress, ProgressUpdate::upload_complete(label(), size));
            Ok(size)
        },
        Err(e) => {
            progress::emit(progress, ProgressUpdate::error(label(), e.to_string()));
            Err(e)
        },
    }
}
