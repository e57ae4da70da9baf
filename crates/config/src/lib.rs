//! Declarative configuration record, its §6 defaults, and config-store
//! persistence.
//!
//! Encoding on disk is deliberately out of this crate's contract (see
//! `SPEC_FULL.md` §1) — [`ConfigStore`] is a trait precisely so a consumer
//! can swap the one concrete implementation here ([`TomlFileConfigStore`])
//! for a different grammar without touching `drift-manager`.

pub mod error;
mod record;
mod store;

pub use crate::record::{AwsConfig, ConfigRecord, Settings, SyncDefaults, WatchEntry};
pub use crate::store::{ConfigStore, TomlFileConfigStore};
