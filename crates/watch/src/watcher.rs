//! Recursive filesystem watcher: subscribes to a directory tree, coalesces
//! events through a [`Debouncer`], and fires a [`SyncEngine`] sync on each
//! quiet period.

use crate::config::{WatchConfig, WatchStatus};
use crate::debouncer::Debouncer;
use crate::error::{ErrorKind, Result};
use crate::exclude::ExcludeSet;
use drift_storage::BackendHandle;
use drift_sync::{SyncEngine, SyncOptions};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
// Brought in only for its trait methods (`watch`); `Watcher` the trait name
// would otherwise collide with this module's own `Watcher` struct.
use notify::Watcher as _;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct RunningHandle {
    cancel: CancellationToken,
    debouncer: Arc<Debouncer>,
    task: JoinHandle<()>,
}

/// Owns one OS-level recursive directory subscription plus the [`Debouncer`]
/// and [`SyncEngine`] it feeds. See module docs and `SPEC_FULL.md` §4.6.
pub struct Watcher {
    config: WatchConfig,
    source: BackendHandle,
    destination: BackendHandle,
    engine: SyncEngine,
    sync_options: SyncOptions,
    status: Arc<RwLock<WatchStatus>>,
    running: StdMutex<Option<RunningHandle>>,
}

impl Watcher {
    pub fn new(config: WatchConfig, source: BackendHandle, destination: BackendHandle, sync_options: SyncOptions) -> Self {
        let status = WatchStatus::new(config.source.clone(), config.destination.clone());
        Self {
            config,
            source,
            destination,
            engine: SyncEngine::new(),
            sync_options,
            status: Arc::new(RwLock::new(status)),
            running: StdMutex::new(None),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub async fn status(&self) -> WatchStatus {
        self.status.read().await.clone()
    }

    pub fn is_active(&self) -> bool {
        self.running.lock().expect("watcher mutex poisoned").is_some()
    }

    /// Walk `source`, subscribe to every non-excluded directory, and launch
    /// the event loop. Fails with [`ErrorKind::AlreadyActive`] if already
    /// running.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.is_active() {
            exn::bail!(ErrorKind::AlreadyActive);
        }

        let excludes = Arc::new(ExcludeSet::compile(&self.config.exclude_patterns)?);
        let directories = discover_directories(&self.config.source, &excludes)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut notify_watcher = notify::recommended_watcher(move |event| {
            // notify's callback runs on its own thread; forward into the
            // async event loop via an unbounded channel so it never blocks.
            let _ = tx.send(event);
        })
        .map_err(|e| exn::Exn::from(ErrorKind::Subscription(e.to_string())))?;

        let mut watched = HashSet::new();
        for dir in directories {
            notify_watcher
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|e| exn::Exn::from(ErrorKind::Subscription(e.to_string())))?;
            watched.insert(dir);
        }

        let cancel = CancellationToken::new();
        let debouncer = {
            let watcher = Arc::clone(self);
            let cancel = cancel.clone();
            Arc::new(Debouncer::new(self.config.debounce_delay, move || {
                let watcher = Arc::clone(&watcher);
                let cancel = cancel.clone();
                async move { watcher.run_sync(cancel).await }
            }))
        };

        {
            let mut status = self.status.write().await;
            status.active = true;
            status.started_at = Some(OffsetDateTime::now_utc());
        }

        if self.config.sync_on_start {
            debouncer.flush().await;
        }

        let task = {
            let watcher = Arc::clone(self);
            let debouncer = Arc::clone(&debouncer);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                watcher.event_loop(rx, notify_watcher, excludes, watched, debouncer, cancel).await;
            })
        };

        *self.running.lock().expect("watcher mutex poisoned") = Some(RunningHandle { cancel, debouncer, task });
        Ok(())
    }

    /// Stop the debouncer, cancel the event loop, wait for it to exit (which
    /// drops the notify watcher and releases the OS-level subscription).
    /// Fails with [`ErrorKind::NotActive`] if not running.
    pub async fn stop(&self) -> Result<()> {
        let handle = self.running.lock().expect("watcher mutex poisoned").take();
        let Some(handle) = handle else {
            exn::bail!(ErrorKind::NotActive);
        };
        handle.debouncer.stop();
        handle.cancel.cancel();
        let _ = handle.task.await;
        let mut status = self.status.write().await;
        status.active = false;
        Ok(())
    }

    async fn event_loop(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        mut notify_watcher: RecommendedWatcher,
        excludes: Arc<ExcludeSet>,
        mut watched: HashSet<PathBuf>,
        debouncer: Arc<Debouncer>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = events.recv() => {
                    match received {
                        None => break,
                        Some(Ok(event)) => {
                            self.handle_event(event, &mut notify_watcher, &excludes, &mut watched, &debouncer).await;
                        },
                        Some(Err(err)) => {
                            warn!(error = %err, "subscription error");
                            let mut status = self.status.write().await;
                            status.error_count += 1;
                            status.last_error = Some(err.to_string());
                        },
                    }
                }
            }
        }
        // `notify_watcher` drops here, releasing the OS-level subscription.
    }

    async fn handle_event(
        &self,
        event: Event,
        notify_watcher: &mut RecommendedWatcher,
        excludes: &ExcludeSet,
        watched: &mut HashSet<PathBuf>,
        debouncer: &Arc<Debouncer>,
    ) {
        let is_relevant_kind = !matches!(event.kind, EventKind::Access(_) | EventKind::Other);
        for path in &event.paths {
            if excludes.matches(path) {
                continue;
            }
            if matches!(event.kind, EventKind::Create(_)) && path.is_dir() && !watched.contains(path) {
                match discover_directories(path, excludes) {
                    Ok(new_dirs) => {
                        for dir in new_dirs {
                            if watched.contains(&dir) {
                                continue;
                            }
                            match notify_watcher.watch(&dir, RecursiveMode::NonRecursive) {
                                Ok(()) => {
                                    watched.insert(dir);
                                },
                                Err(err) => {
                                    let mut status = self.status.write().await;
                                    status.error_count += 1;
                                    status.last_error = Some(err.to_string());
                                },
                            }
                        }
                    },
                    Err(err) => {
                        let mut status = self.status.write().await;
                        status.error_count += 1;
                        status.last_error = Some(err.to_string());
                    },
                }
            }
            if is_relevant_kind {
                debouncer.trigger();
            }
        }
    }

    async fn run_sync(&self, cancel: CancellationToken) {
        if self.config.min_age > Duration::ZERO {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.min_age) => {},
            }
        }
        debug!(id = %self.config.id, "quiet period elapsed, syncing");
        let result = self.engine.sync(&self.source, &self.destination, None, None, &self.sync_options, cancel).await;
        let mut status = self.status.write().await;
        match result {
            Ok(summary) => {
                status.last_sync = Some(OffsetDateTime::now_utc());
                status.files_synced += summary.files_synced;
                status.bytes_synced += summary.bytes_synced;
            },
            Err(err) => {
                status.error_count += 1;
                status.last_error = Some(err.to_string());
            },
        }
    }
}

/// Recursively list every directory under `root` (including `root` itself)
/// whose basename doesn't match an exclude pattern, without descending into
/// excluded subtrees.
fn discover_directories(root: &Path, excludes: &ExcludeSet) -> Result<Vec<PathBuf>> {
    let mut directories = Vec::new();
    let walker = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !entry.file_type().is_dir() || !excludes.matches(entry.path()));
    for entry in walker {
        let entry = entry.map_err(|e| exn::Exn::from(ErrorKind::Walk(e.to_string())))?;
        if entry.file_type().is_dir() {
            directories.push(entry.path().to_path_buf());
        }
    }
    Ok(directories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_storage::backend::{LocalBackend, MockBackend};
    use std::time::Duration as StdDuration;

    fn config(source: PathBuf) -> WatchConfig {
        let mut cfg = WatchConfig::new("w1", source, "mock://dest");
        cfg.debounce_delay = StdDuration::from_millis(50);
        cfg.min_age = StdDuration::ZERO;
        cfg
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn s8_directory_created_then_file_inside_triggers_one_sync() {
        let temp = tempfile::tempdir().unwrap();
        let source = Arc::new(LocalBackend::new("src", temp.path()).unwrap());
        let destination = Arc::new(MockBackend::default());
        let watcher = Arc::new(Watcher::new(
            config(temp.path().to_path_buf()),
            source.clone(),
            destination.clone(),
            SyncOptions::new(),
        ));

        watcher.start().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        std::fs::create_dir(temp.path().join("sub")).unwrap();
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        std::fs::write(temp.path().join("sub/new.txt"), b"hi").unwrap();

        tokio::time::sleep(StdDuration::from_millis(300)).await;
        let status = watcher.status().await;
        assert!(status.files_synced >= 1, "expected at least one file synced, got {status:?}");
        assert!(destination.contains(Path::new("sub/new.txt")).await);

        watcher.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_twice_fails_already_active() {
        let temp = tempfile::tempdir().unwrap();
        let source = Arc::new(LocalBackend::new("src", temp.path()).unwrap());
        let destination = Arc::new(MockBackend::default());
        let watcher =
            Arc::new(Watcher::new(config(temp.path().to_path_buf()), source, destination, SyncOptions::new()));

        watcher.start().await.unwrap();
        let err = watcher.start().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyActive));
        watcher.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_when_idle_fails_not_active() {
        let temp = tempfile::tempdir().unwrap();
        let source = Arc::new(LocalBackend::new("src", temp.path()).unwrap());
        let destination = Arc::new(MockBackend::default());
        let watcher =
            Arc::new(Watcher::new(config(temp.path().to_path_buf()), source, destination, SyncOptions::new()));

        let err = watcher.stop().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotActive));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_on_start_runs_before_any_event() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("existing.txt"), b"already here").unwrap();
        let source = Arc::new(LocalBackend::new("src", temp.path()).unwrap());
        let destination = Arc::new(MockBackend::default());
        let mut cfg = config(temp.path().to_path_buf());
        cfg.sync_on_start = true;
        let watcher = Arc::new(Watcher::new(cfg, source, destination.clone(), SyncOptions::new()));

        watcher.start().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(destination.contains(Path::new("existing.txt")).await);
        watcher.stop().await.unwrap();
    }

    #[test]
    fn discover_directories_prunes_excluded_subtrees() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp.path().join("keep")).unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        std::fs::create_dir(temp.path().join(".git/objects")).unwrap();
        let excludes = ExcludeSet::compile(&[".git".to_string()]).unwrap();

        let dirs = discover_directories(temp.path(), &excludes).unwrap();
        let names: Vec<_> = dirs.iter().filter_map(|d| d.file_name()).map(|n| n.to_string_lossy().to_string()).collect();
        assert!(names.contains(&"keep".to_string()));
        assert!(!names.contains(&".git".to_string()));
        assert!(!names.iter().any(|n| n == "objects"));
    }
}
