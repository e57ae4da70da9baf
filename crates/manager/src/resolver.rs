//! The resolver: the one coupling point between the manager and backend
//! choice (local filesystem vs. object store).

use drift_storage::backend::LocalBackend;
use drift_storage::BackendHandle;
use exn::ResultExt;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, Result};

/// Turns a configured path/URI string into a concrete backend plus the path
/// within it that the caller's string actually named (e.g. the key prefix
/// after an object-store bucket). Per `SPEC_FULL.md` §4.7 this is the only
/// place the manager is coupled to a specific backend implementation —
/// everywhere else it deals in `BackendHandle`.
pub type Resolver =
    Arc<dyn Fn(String, CancellationToken) -> BoxFuture<'static, Result<(BackendHandle, PathBuf)>> + Send + Sync>;

/// A resolver that treats every input as a local filesystem directory.
///
/// Useful on its own for manager tests, and as the fallback arm of a
/// caller-composed resolver that also recognizes an object-store scheme
/// (credential resolution for which is out of scope here — see
/// `SPEC_FULL.md` §1).
pub fn local_resolver() -> Resolver {
    Arc::new(|input: String, _cancel: CancellationToken| {
        Box::pin(async move {
            let root = PathBuf::from(&input);
            let backend = LocalBackend::new(input.clone(), &root)
                .or_raise(|| ErrorKind::Resolve(input.clone(), "not an absolute local path".to_string()))?;
            Ok((Arc::new(backend) as BackendHandle, PathBuf::new()))
        })
    })
}
