//! # saps-extract
//!
//! Extract structured farm data from scanned SAPS (Single Area Payment
//! Scheme) subsidy applications using Vision Language Models.
//!
//! ## Why this crate?
//!
//! SAPS applications run to dozens of scanned pages, and the fields an
//! underwriting flow needs (applicant identity, parcel block IDs, cultivated
//! area, crops) are scattered across them. This crate sends the page images
//! to a vision model in bounded batches, parses whatever JSON the model
//! returns, merges the partial results, and stops as soon as every required
//! field is known. Whatever happens upstream, the caller gets exactly one
//! record back, clearly flagged when any of it is placeholder data.
//!
//! ## Pipeline Overview
//!
//! ```text
//! DocumentRef
//!  │
//!  ├─ 1. Validate  file type, MIME type and signature (the only fatal step)
//!  ├─ 2. List      page-image URLs from the ImageSource
//!  ├─ 3. Batch     drop unusable URLs, cut into batches of ≤ 20 pages
//!  ├─ 4. Extract   one VLM call per batch, sequential, overload retry
//!  ├─ 5. Merge     fill-forward merge, early exit once complete
//!  └─ 6. Finalize  area/crop fallback, crop financials, total revenue
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use saps_extract::{
//!     resolve_service, DocumentRef, ExtractionConfig, ExtractionPipeline, MemorySink,
//!     StaticImageSource,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     // Uses ANTHROPIC_API_KEY, or EDGEQUAKE_LLM_PROVIDER for other providers
//!     let service = resolve_service(&config, None)?;
//!     let images = StaticImageSource::new().with_document(
//!         "doc-1",
//!         vec!["https://cdn.example.com/saps/doc-1/page-1.png".to_string()],
//!     );
//!     let pipeline = ExtractionPipeline::new(
//!         config,
//!         service,
//!         Arc::new(images),
//!         Arc::new(MemorySink::new()),
//!     );
//!
//!     let doc = DocumentRef::new("doc-1", "user-42", "kerelem.pdf", 482_113);
//!     let output = pipeline.process(&doc, &CancellationToken::new()).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.record)?);
//!     if !output.is_genuine() {
//!         eprintln!("warning: {:?}", output.record.error_message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `saps-extract` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! saps-extract = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod crops;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod sink;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, RetryPolicy};
pub use error::{BatchError, InputError, SapsError, ServiceError, SinkError, SourceError};
pub use extract::{resolve_service, ExtractionPipeline};
pub use output::{BatchOutcome, ExtractionOutput, ExtractionStats, FallbackReason, PipelineProgress};
pub use pipeline::input::DocumentRef;
pub use pipeline::llm::{ExtractionService, ServiceReply};
pub use progress::{
    ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, ProgressUpdate,
    WatchProgress,
};
pub use record::{Culture, CropYearRecord, DataOrigin, ExtractionFieldSet, RequiredField, Slot};
pub use sink::{DirectorySink, MemorySink, NoopSink, PersistenceSink};
pub use source::{ImageSource, StaticImageSource};
