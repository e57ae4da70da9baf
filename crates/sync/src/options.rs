//! Configuration of one [`crate::SyncEngine::sync`] invocation.

use crate::progress::ProgressSender;

/// Default worker pool size when `concurrency <= 0`.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Configuration of one sync invocation.
#[derive(Default, Clone)]
pub struct SyncOptions {
    /// If `true`, planning runs but no mutation of the destination occurs.
    pub dry_run: bool,
    /// If `true`, entries present in the destination and absent from the
    /// source are removed.
    pub delete: bool,
    /// Maximum number of parallel in-flight transfers. A value `<= 0` means
    /// "use [`DEFAULT_CONCURRENCY`]".
    pub concurrency: i64,
    /// Optional sink receiving [`crate::ProgressUpdate`] records.
    pub progress: Option<ProgressSender>,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_delete(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }

    pub fn with_concurrency(mut self, concurrency: i64) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Resolved worker pool size, applying the `<= 0` default rule.
    pub(crate) fn resolved_concurrency(&self) -> usize {
        if self.concurrency <= 0 {
            DEFAULT_CONCURRENCY
        } else {
            self.concurrency as usize
        }
    }
}
