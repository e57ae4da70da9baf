//! Recursive filesystem watcher with debounced, min-age-gated sync triggering.
//!
//! A [`Watcher`] owns one OS-level recursive subscription on a directory
//! tree, coalesces the resulting burst of events through a [`Debouncer`],
//! and invokes a [`drift_sync::SyncEngine`] once the quiet period elapses.

pub mod config;
pub mod debouncer;
pub mod error;
pub mod exclude;
mod watcher;

pub use crate::config::{WatchConfig, WatchStatus};
pub use crate::debouncer::Debouncer;
pub use crate::exclude::ExcludeSet;
pub use crate::watcher::Watcher;
