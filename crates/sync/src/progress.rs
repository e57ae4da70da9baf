//! Progress reporting surface emitted by the sync engine.

use std::path::PathBuf;

/// One observation emitted by the engine during a sync.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub operation: Operation,
    /// The target path, or a human-readable summary for [`Operation::Summary`].
    pub path: String,
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub error: Option<String>,
}

/// The kind of event a [`ProgressUpdate`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Summary,
    Upload,
    Delete,
    Skip,
    Error,
}

impl ProgressUpdate {
    pub fn summary(text: impl Into<String>) -> Self {
        Self { operation: Operation::Summary, path: text.into(), bytes_done: 0, bytes_total: 0, error: None }
    }

    pub fn upload_started(path: impl Into<String>, bytes_total: u64) -> Self {
        Self { operation: Operation::Upload, path: path.into(), bytes_done: 0, bytes_total, error: None }
    }

    pub fn upload_complete(path: impl Into<String>, bytes_total: u64) -> Self {
        Self { operation: Operation::Upload, path: path.into(), bytes_done: bytes_total, bytes_total, error: None }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self { operation: Operation::Delete, path: path.into(), bytes_done: 0, bytes_total: 0, error: None }
    }

    pub fn skip(path: impl Into<String>) -> Self {
        Self { operation: Operation::Skip, path: path.into(), bytes_done: 0, bytes_total: 0, error: None }
    }

    pub fn error(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self { operation: Operation::Error, path: path.into(), bytes_done: 0, bytes_total: 0, error: Some(error.into()) }
    }

    /// `true` when this update signals a completed transfer
    /// (`bytes_done == bytes_total` and `bytes_total > 0`).
    pub fn is_complete(&self) -> bool {
        self.bytes_total > 0 && self.bytes_done == self.bytes_total
    }
}

/// Sender half of the progress channel. The engine owns this; callers own
/// the matching `UnboundedReceiver` and drain it on their own schedule.
pub type ProgressSender = tokio::sync::mpsc::UnboundedSender<ProgressUpdate>;

pub(crate) fn emit(sender: Option<&ProgressSender>, update: ProgressUpdate) {
    if let Some(sender) = sender {
        // Dropped receivers just mean nobody's listening; that's not a sync failure.
        let _ = sender.send(update);
    }
}
