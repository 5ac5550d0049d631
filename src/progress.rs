//! Progress reporting for long-running document extraction.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! phase transitions and per-batch events.
//!
//! Callers that poll at their own cadence (a web handler answering status
//! requests, say) can use [`WatchProgress`], which publishes every update into
//! a `tokio::sync::watch` channel. Readers only ever see the latest value and
//! never block the pipeline.
//!
//! # Example
//!
//! ```rust
//! use saps_extract::{ExtractionConfig, WatchProgress};
//! use std::sync::Arc;
//!
//! let (progress, rx) = WatchProgress::channel();
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(progress))
//!     .build()
//!     .unwrap();
//! assert_eq!(rx.borrow().progress, 0);
//! ```

use crate::output::{BatchOutcome, PipelineProgress};
use crate::record::ExtractionFieldSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Batch-level detail attached to a [`ProgressUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub current_batch: usize,
    pub total_batches: usize,
    pub pages_processed: usize,
    pub total_pages: usize,
}

/// Caller-facing progress snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Human-readable phase name.
    pub step: String,
    /// 0–100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_progress: Option<BatchProgress>,
}

impl ProgressUpdate {
    pub fn new(step: impl Into<String>, progress: u8) -> Self {
        Self {
            step: step.into(),
            progress: progress.min(100),
            details: None,
            batch_progress: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_batch(mut self, batch: BatchProgress) -> Self {
        self.batch_progress = Some(batch);
        self
    }
}

/// Called by the pipeline as it processes a document.
///
/// Every method has a no-op default so implementations only override what
/// they need. Batches run sequentially, so events for one document never
/// overlap; the trait is `Send + Sync` because one callback may be shared by
/// pipelines running on different tasks.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called at every phase transition and after every batch.
    fn on_update(&self, update: &ProgressUpdate) {
        let _ = update;
    }

    /// Called just before batch `batch_index` (1-indexed) is submitted.
    fn on_batch_start(&self, batch_index: usize, total_batches: usize) {
        let _ = (batch_index, total_batches);
    }

    /// Called after a batch was parsed and merged.
    fn on_batch_complete(&self, outcome: &BatchOutcome, progress: &PipelineProgress) {
        let _ = (outcome, progress);
    }

    /// Called when a batch failed; the pipeline continues with the next one.
    fn on_batch_error(&self, batch_index: usize, total_batches: usize, error: &str) {
        let _ = (batch_index, total_batches, error);
    }

    /// Called once with the terminal record.
    fn on_complete(&self, record: &ExtractionFieldSet) {
        let _ = record;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

/// Publishes [`ProgressUpdate`]s into a watch channel.
///
/// The published percentage never decreases: an update reporting less
/// progress than the current value keeps the higher figure.
pub struct WatchProgress {
    tx: watch::Sender<ProgressUpdate>,
}

impl WatchProgress {
    /// Create the publisher and a receiver for polling.
    pub fn channel() -> (Self, watch::Receiver<ProgressUpdate>) {
        let (tx, rx) = watch::channel(ProgressUpdate::new("Waiting", 0));
        (Self { tx }, rx)
    }

    /// Another receiver on the same channel.
    pub fn subscribe(&self) -> watch::Receiver<ProgressUpdate> {
        self.tx.subscribe()
    }
}

impl ExtractionProgressCallback for WatchProgress {
    fn on_update(&self, update: &ProgressUpdate) {
        self.tx.send_modify(|current| {
            let progress = current.progress.max(update.progress);
            *current = update.clone();
            current.progress = progress;
        });
    }
}
