pub mod backend;
pub mod error;
pub mod file;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::file::FileInfo;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

/// A reference-counted, type-erased handle to any storage backend.
///
/// This is the shared-ownership form callers pass around once a backend no
/// longer needs to be a concrete type — decorators, the sync engine, and the
/// watch manager's resolver all traffic in `BackendHandle`.
pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
