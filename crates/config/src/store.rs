//! The `ConfigStore` trait and a concrete TOML-backed implementation.
//!
//! The exact on-disk grammar is explicitly not part of this crate's
//! contract (`SPEC_FULL.md` §1/§6.1) — `TomlFileConfigStore` is one concrete
//! choice so the manager's persistence round-trip is actually exercisable;
//! a consumer is free to swap in a YAML- or JSON-backed `ConfigStore`
//! without touching `drift-manager`.

use async_trait::async_trait;
use exn::ResultExt;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};
use crate::record::ConfigRecord;

/// Read/write typed configuration records.
///
/// Implementations own no live handle between calls — each `load`/`save` is
/// a self-contained round trip to whatever backing store they wrap.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the current record, falling back to `ConfigRecord::default()`
    /// for any field group the backing store doesn't declare.
    async fn load(&self) -> Result<ConfigRecord>;

    /// Persist `record`, replacing whatever was previously stored.
    async fn save(&self, record: &ConfigRecord) -> Result<()>;
}

/// A [`ConfigStore`] backed by a single TOML file on disk, with environment
/// variable overrides (prefixed `DRIFT_`) layered on top via `figment`.
///
/// Loading a path that doesn't exist yet is not an error: it resolves to
/// `ConfigRecord::default()`, exactly as if the file existed but declared
/// nothing (see `SPEC_FULL.md` §6 "Defaults when no record exists").
pub struct TomlFileConfigStore {
    path: PathBuf,
}

impl TomlFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The platform-conventional config path (`<config dir>/drift/config.toml`),
    /// resolved via `directories::ProjectDirs`. Returns `None` on platforms
    /// without a meaningful home/config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "drift").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for TomlFileConfigStore {
    async fn load(&self) -> Result<ConfigRecord> {
        let path = self.path.clone();
        let figment = Figment::from(Serialized::defaults(ConfigRecord::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("DRIFT_").split("__"));
        figment.extract().or_raise(|| ErrorKind::ConfigError(path.display().to_string()))
    }

    async fn save(&self, record: &ConfigRecord) -> Result<()> {
        let body = toml::to_string_pretty(record)
            .or_raise(|| ErrorKind::ConfigError("failed to serialize configuration".to_string()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Io(self.path.display().to_string()))?;
        }
        tokio::fs::write(&self.path, body).await.or_raise(|| ErrorKind::Io(self.path.display().to_string()))?;
        tracing::debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::WatchEntry;
    use std::sync::Mutex;

    // `env_override_wins_over_file` mutates process-wide environment state
    // that every other test in this module also reads (via figment's
    // `Env::prefixed` layer). Serialize the whole module on one lock so a
    // leaked `DRIFT_VERSION` from a concurrently-running test can't flip
    // an unrelated assertion.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn load_missing_file_yields_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = TomlFileConfigStore::new(dir.path().join("nonexistent.toml"));
        let record = store.load().await.unwrap();
        assert_eq!(record, ConfigRecord::default());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = TomlFileConfigStore::new(dir.path().join("config.toml"));
        let mut record = ConfigRecord::default();
        record.watches.push(WatchEntry {
            id: "docs".to_string(),
            source: "/tmp/docs".to_string(),
            destination: "s3://bucket/docs".to_string(),
            enabled: true,
            ..WatchEntry::default()
        });

        store.save(&record).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn env_override_wins_over_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "version = \"1\"\n").await.unwrap();
        // SAFETY: exclusive access to the environment is held via `ENV_LOCK`
        // for the duration of this test.
        unsafe {
            std::env::set_var("DRIFT_VERSION", "2");
        }
        let store = TomlFileConfigStore::new(&path);
        let record = store.load().await.unwrap();
        unsafe {
            std::env::remove_var("DRIFT_VERSION");
        }
        assert_eq!(record.version, "2");
    }
}
