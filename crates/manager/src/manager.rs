//! Keyed collection of [`Watcher`]s: lifecycle, plus persistence to and
//! restoration from a [`ConfigStore`].

use drift_config::{ConfigStore, WatchEntry};
use drift_storage::BackendHandle;
use drift_sync::SyncOptions;
use drift_watch::{WatchConfig, Watcher};
use exn::ResultExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::{ErrorKind, Result};
use crate::resolver::Resolver;

/// Keyed map `id -> Watcher`, guarded by a reader/writer lock: reads
/// (`get`/`list`) may proceed concurrently, mutations (`add`/`remove`/
/// `stop_all`) are exclusive. See `SPEC_FULL.md` §4.7/§5.
pub struct WatchManager {
    watchers: RwLock<HashMap<String, Arc<Watcher>>>,
    config_store: Arc<dyn ConfigStore>,
}

impl WatchManager {
    pub fn new(config_store: Arc<dyn ConfigStore>) -> Self {
        Self { watchers: RwLock::new(HashMap::new()), config_store }
    }

    /// Construct a `SyncEngine` (default concurrency) and `Watcher` for
    /// `config`, and start it. Fails with [`ErrorKind::AlreadyExists`] if
    /// `config.id` is already present; on a start failure the entry is not
    /// retained.
    #[instrument(skip_all, fields(id = %config.id))]
    pub async fn add(&self, config: WatchConfig, source: BackendHandle, destination: BackendHandle) -> Result<()> {
        let id = config.id.clone();
        if self.watchers.read().await.contains_key(&id) {
            exn::bail!(ErrorKind::AlreadyExists(id));
        }

        let watcher = Arc::new(Watcher::new(config, source, destination, SyncOptions::new()));
        watcher.start().await.or_raise(|| ErrorKind::Start(id.clone()))?;

        let mut guard = self.watchers.write().await;
        if guard.contains_key(&id) {
            // Lost a race between the read check above and taking the write
            // lock: back out the watcher we just started rather than leak it.
            drop(guard);
            let _ = watcher.stop().await;
            exn::bail!(ErrorKind::AlreadyExists(id));
        }
        info!(id = %id, "watch added");
        guard.insert(id, watcher);
        Ok(())
    }

    /// Stop and remove the watch named `id`. Fails with
    /// [`ErrorKind::NotFound`] if it doesn't exist.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<()> {
        let watcher = self.watchers.write().await.remove(id);
        let Some(watcher) = watcher else {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        };
        watcher.stop().await.or_raise(|| ErrorKind::Stop(id.to_string()))?;
        info!(id = %id, "watch removed");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Watcher>> {
        self.watchers.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<Arc<Watcher>> {
        self.watchers.read().await.values().cloned().collect()
    }

    /// Stop every contained watch, in sequence, waiting for each.
    #[instrument(skip(self))]
    pub async fn stop_all(&self) {
        let drained: Vec<(String, Arc<Watcher>)> = self.watchers.write().await.drain().collect();
        for (id, watcher) in drained {
            if let Err(err) = watcher.stop().await {
                warn!(id = %id, error = %err, "failed to stop watcher during stop_all");
            }
        }
    }

    /// [`Self::add`], then persist the resulting watch set via the config
    /// store. Rolls back (calls [`Self::remove`]) if persistence fails.
    pub async fn add_watch(&self, config: WatchConfig, source: BackendHandle, destination: BackendHandle) -> Result<()> {
        let id = config.id.clone();
        self.add(config, source, destination).await?;
        if let Err(err) = self.save_config().await {
            let _ = self.remove(&id).await;
            return Err(err);
        }
        Ok(())
    }

    /// [`Self::remove`], then persist the resulting watch set.
    pub async fn remove_watch(&self, id: &str) -> Result<()> {
        self.remove(id).await?;
        self.save_config().await
    }

    /// Snapshot the current watch set and write it through the config store,
    /// preserving every other field group in the stored record untouched.
    pub async fn save_config(&self) -> Result<()> {
        let mut record =
            self.config_store.load().await.or_raise(|| ErrorKind::ConfigStore("load before save".to_string()))?;
        let watchers = self.watchers.read().await;
        record.watches = watchers.values().map(|w| config_to_entry(w.config())).collect();
        drop(watchers);
        self.config_store.save(&record).await.or_raise(|| ErrorKind::ConfigStore("save".to_string()))
    }

    /// Read the declared watch set; for every `enabled = true` entry,
    /// resolve its `source`/`destination` strings into backends with
    /// `resolver` and call [`Self::add`] — without re-persisting, since the
    /// config store is the thing we just read from.
    #[instrument(skip(self, resolver))]
    pub async fn load_from_config(&self, resolver: Resolver) -> Result<()> {
        let record =
            self.config_store.load().await.or_raise(|| ErrorKind::ConfigStore("load".to_string()))?;
        for entry in record.watches.into_iter().filter(|entry| entry.enabled) {
            let config = entry_to_config(&entry);
            let (source, _) = resolver(entry.source.clone(), CancellationToken::new())
                .await
                .map_err(|e| exn::Exn::from(ErrorKind::Resolve(entry.source.clone(), e.to_string())))?;
            let (destination, _) = resolver(entry.destination.clone(), CancellationToken::new())
                .await
                .map_err(|e| exn::Exn::from(ErrorKind::Resolve(entry.destination.clone(), e.to_string())))?;
            self.add(config, source, destination).await?;
        }
        Ok(())
    }
}

fn config_to_entry(config: &WatchConfig) -> WatchEntry {
    WatchEntry {
        id: config.id.clone(),
        source: config.source.to_string_lossy().into_owned(),
        destination: config.destination.clone(),
        debounce_seconds: config.debounce_delay.as_secs(),
        min_age_seconds: config.min_age.as_secs(),
        delete_source: config.delete_source,
        sync_on_start: config.sync_on_start,
        exclude: config.exclude_patterns.clone(),
        enabled: config.enabled,
    }
}

fn entry_to_config(entry: &WatchEntry) -> WatchConfig {
    WatchConfig {
        id: entry.id.clone(),
        source: PathBuf::from(&entry.source),
        destination: entry.destination.clone(),
        debounce_delay: Duration::from_secs(entry.debounce_seconds),
        min_age: Duration::from_secs(entry.min_age_seconds),
        delete_source: entry.delete_source,
        sync_on_start: entry.sync_on_start,
        exclude_patterns: entry.exclude.clone(),
        enabled: entry.enabled,
    }
}
