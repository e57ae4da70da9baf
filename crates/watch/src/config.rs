//! Declarative watch configuration and observable status.

use std::path::PathBuf;
use std::time::Duration;
use time::OffsetDateTime;

/// A durable record of one directory-to-destination subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// Unique, non-empty identifier for this watch.
    pub id: String,
    /// Local directory to watch.
    pub source: PathBuf,
    /// Destination path or URI (interpreted by the caller's resolver).
    pub destination: String,
    /// Quiet period before a burst of changes triggers a sync.
    pub debounce_delay: Duration,
    /// Minimum wall-clock age the engine waits before running, as a crude
    /// quiescence heuristic for partially-written files.
    pub min_age: Duration,
    /// Reserved: removing the source file after a successful sync is
    /// declared here but never consumed by [`crate::Watcher`]. Kept only so
    /// it round-trips through the config store; implementing it would mean
    /// fabricating a semantic the original system never actually shipped.
    pub delete_source: bool,
    /// Perform one sync immediately upon [`crate::Watcher::start`].
    pub sync_on_start: bool,
    /// Glob patterns matched against each changed path's **basename only**
    /// (not the full relative path) — see [`crate::exclude::ExcludeSet::matches`].
    /// A pattern containing `/` (e.g. the common `.git/**`) can therefore
    /// never match a basename; this mirrors the source system's behavior
    /// rather than silently extending it to full-path matching.
    pub exclude_patterns: Vec<String>,
    /// Whether this watch should be restored by
    /// [`WatchManager::load_from_config`](../drift_manager/struct.WatchManager.html#method.load_from_config)
    /// (renamed here to avoid a doc-link into a crate this one doesn't
    /// depend on; see `drift-manager`). A `Watcher` itself doesn't consult
    /// this field once constructed — only the manager's restore path does.
    pub enabled: bool,
}

impl WatchConfig {
    pub fn new(id: impl Into<String>, source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            destination: destination.into(),
            debounce_delay: Duration::from_secs(2),
            min_age: Duration::ZERO,
            delete_source: false,
            sync_on_start: false,
            exclude_patterns: Vec::new(),
            enabled: true,
        }
    }
}

/// Observable runtime state of one [`crate::Watcher`].
#[derive(Debug, Clone)]
pub struct WatchStatus {
    pub source: PathBuf,
    pub destination: String,
    pub active: bool,
    pub started_at: Option<OffsetDateTime>,
    pub last_sync: Option<OffsetDateTime>,
    pub files_synced: u64,
    pub bytes_synced: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
}

impl WatchStatus {
    pub fn new(source: PathBuf, destination: String) -> Self {
        Self {
            source,
            destination,
            active: false,
            started_at: None,
            last_sync: None,
            files_synced: 0,
            bytes_synced: 0,
            error_count: 0,
            last_error: None,
        }
    }
}
