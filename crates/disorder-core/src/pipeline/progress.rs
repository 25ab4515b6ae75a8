//! Progress reporting hooks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A progress notification emitted by the pipeline.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Enumeration finished; `total` paths remain after skipping `skipped`
    Started { total: usize, skipped: usize },

    /// One image of the current batch was opened (or dropped)
    Loaded {
        completed: usize,
        batch_len: usize,
        elapsed: Duration,
    },

    /// One image was scored
    Scored {
        processed: usize,
        total: usize,
        path: PathBuf,
    },

    /// One image was dropped
    Failed { path: PathBuf, reason: String },

    /// Queued records were persisted
    Flushed { records: usize, written: usize },
}

/// Callback receiving progress events; shared across worker tasks.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Invoke an optional callback.
pub(crate) fn report(progress: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = progress {
        callback(&event);
    }
}
