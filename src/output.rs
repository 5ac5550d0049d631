//! Result types returned by the extraction pipeline.

use crate::error::BatchError;
use crate::pipeline::parse::SchemaKind;
use crate::record::ExtractionFieldSet;
use serde::{Deserialize, Serialize};

/// Result of submitting one batch.
///
/// `raw_text` is kept even when parsing failed so the reply can be audited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// 1-indexed batch number.
    pub batch_index: usize,
    pub total_batches: usize,
    pub image_count: usize,
    /// Parsed record, or `None` when the call or the parse failed.
    pub parsed: Option<ExtractionFieldSet>,
    /// Which response schema matched.
    pub schema: Option<SchemaKind>,
    /// Model reply verbatim; empty when the call failed.
    pub raw_text: String,
    pub success: bool,
    pub error: Option<BatchError>,
    /// Service calls made for this batch, retries included.
    pub attempts: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Running counters for one document, owned by the coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub processed_batches: usize,
    pub processed_pages: usize,
    pub total_batches: usize,
    pub total_pages: usize,
    /// Merged record after the most recent batch.
    pub combined: ExtractionFieldSet,
}

impl PipelineProgress {
    pub fn new(total_batches: usize, total_pages: usize) -> Self {
        Self {
            total_batches,
            total_pages,
            ..Default::default()
        }
    }

    /// Percentage of batches done, 0–100.
    pub fn percent(&self) -> u8 {
        if self.total_batches == 0 {
            return 100;
        }
        ((self.processed_batches * 100) / self.total_batches).min(100) as u8
    }
}

/// Why placeholder data was used in the terminal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The document produced no usable page images.
    EmptyDocument,
    /// Every submitted batch failed.
    AllBatchesFailed,
    /// Extraction succeeded but hectares or cultures are still missing.
    IncompleteExtraction,
}

impl FallbackReason {
    pub fn describe(self) -> &'static str {
        match self {
            FallbackReason::EmptyDocument => "the document contained no readable pages",
            FallbackReason::AllBatchesFailed => "every extraction request failed",
            FallbackReason::IncompleteExtraction => {
                "the extracted data lacks area or crop information"
            }
        }
    }
}

/// Aggregate statistics for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Image references returned by the image source.
    pub listed_images: usize,
    pub valid_images: usize,
    pub invalid_images: usize,
    pub unsupported_images: usize,
    pub total_batches: usize,
    pub batches_submitted: usize,
    pub batches_failed: usize,
    /// Batches never submitted because of early exit or cancellation.
    pub batches_skipped: usize,
    pub early_exit: bool,
    pub cancelled: bool,
    pub fallback: Option<FallbackReason>,
    pub sink_failures: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

/// Everything the pipeline returns for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// The terminal record: extracted, augmented, or fully synthetic.
    pub record: ExtractionFieldSet,
    /// Per-batch outcomes in submission order.
    pub batches: Vec<BatchOutcome>,
    /// Final progress counters.
    pub progress: PipelineProgress,
    pub stats: ExtractionStats,
    /// Where the raw replies were archived, if the sink supports it.
    pub response_artifact_url: Option<String>,
}

impl ExtractionOutput {
    /// `true` when the record is entirely real extraction.
    pub fn is_genuine(&self) -> bool {
        !self.record.is_synthetic()
    }
}
