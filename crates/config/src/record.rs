//! The declarative configuration record and its §6 defaults.
//!
//! Every field group carries `#[serde(default)]`, so a config file that
//! declares only `watches` (or nothing at all) still resolves to a complete,
//! valid `ConfigRecord` — the exact on-disk grammar is not part of this
//! crate's contract (see `SPEC_FULL.md` §1/§6.1); what matters is that every
//! field group resolves to the documented default when absent.

use serde::{Deserialize, Serialize};

fn default_version() -> String {
    "1".to_string()
}

fn default_exclude_patterns() -> Vec<String> {
    vec![".git/**".to_string(), ".DS_Store".to_string(), "*.tmp".to_string(), "*.swp".to_string()]
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_concurrency() -> i64 {
    4
}

fn default_true() -> bool {
    true
}

/// Top-level configuration record: AWS credentials hint, sync defaults, the
/// declarative set of watches, and free-standing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigRecord {
    pub version: String,
    pub aws: AwsConfig,
    pub sync: SyncDefaults,
    pub watches: Vec<WatchEntry>,
    pub settings: Settings,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            version: default_version(),
            aws: AwsConfig::default(),
            sync: SyncDefaults::default(),
            watches: Vec::new(),
            settings: Settings::default(),
        }
    }
}

/// Object-store credentials hint. Credential *resolution* is out of scope
/// (see `SPEC_FULL.md` §1) — this only carries the profile/region/endpoint
/// strings a caller-supplied resolver would use to look credentials up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub profile: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self { profile: default_profile(), region: None, endpoint: None }
    }
}

/// Default `SyncOptions`-shaped knobs applied to watches that don't override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncDefaults {
    pub concurrency: i64,
    pub delete: bool,
    pub exclude: Vec<String>,
}

impl Default for SyncDefaults {
    fn default() -> Self {
        Self { concurrency: default_concurrency(), delete: false, exclude: default_exclude_patterns() }
    }
}

/// One declarative watch entry, the on-disk counterpart of
/// [`drift_watch::WatchConfig`]. Kept as a separate, dependency-free type
/// here (rather than reusing `WatchConfig` directly) so this crate never
/// needs to depend on `drift-watch` — the conversion between the two lives
/// in `drift-manager`, the one crate that already depends on both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchEntry {
    pub id: String,
    pub source: String,
    pub destination: String,
    pub debounce_seconds: u64,
    pub min_age_seconds: u64,
    /// Reserved; round-trips through the config store but is never consumed
    /// by the watcher. See `drift_watch::WatchConfig::delete_source`.
    pub delete_source: bool,
    pub sync_on_start: bool,
    pub exclude: Vec<String>,
    pub enabled: bool,
}

impl Default for WatchEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            source: String::new(),
            destination: String::new(),
            debounce_seconds: 2,
            min_age_seconds: 0,
            delete_source: false,
            sync_on_start: false,
            exclude: Vec::new(),
            enabled: default_true(),
        }
    }
}

/// Free-standing settings outside the sync/watch domain. `log_file`/CLI
/// concerns are out of scope (see `SPEC_FULL.md` §1); this only carries the
/// values through so a consumer that does parse a CLI can read them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub verbose: bool,
    pub log_file: Option<String>,
    pub check_updates: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { verbose: false, log_file: None, check_updates: default_true() }
    }
}
