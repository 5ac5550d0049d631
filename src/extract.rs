//! Pipeline coordinator: one document from upload to terminal record.
//!
//! ## State machine
//!
//! ```text
//! Validating → Listing → Preparing → Extracting (batch 1..=N) → Finalizing → Done
//!                             │               │
//!                             └── empty ──────┴── early exit / cancel ──→ Finalizing
//! ```
//!
//! Batches run strictly in order. Each parsed result is merged before the
//! next batch is considered, so the early-exit check always sees everything
//! extracted so far and never spends a call the merged record no longer
//! needs. Cancellation and the overall deadline are checked between batches
//! only; an in-flight call is allowed to finish.
//!
//! Only [`SapsError::Input`] is ever returned. Empty documents, failed
//! batches and incomplete records all end in a flagged placeholder-filled
//! record instead.

use crate::config::ExtractionConfig;
use crate::error::{InputError, SapsError, SourceError};
use crate::output::{
    BatchOutcome, ExtractionOutput, ExtractionStats, FallbackReason, PipelineProgress,
};
use crate::pipeline::anthropic::AnthropicService;
use crate::pipeline::batch::{filter_images, prepare_batches, DocumentBatchJob};
use crate::pipeline::completeness::is_complete;
use crate::pipeline::fallback::FallbackSynthesizer;
use crate::pipeline::finalize::finalize;
use crate::pipeline::input::{validate_document, DocumentRef};
use crate::pipeline::llm::{ExtractionService, ModelClient};
use crate::pipeline::merge::merge;
use crate::pipeline::provider::LlmProviderService;
use crate::progress::{
    BatchProgress, ExtractionProgressCallback, NoopProgressCallback, ProgressUpdate,
};
use crate::sink::{BatchLog, FinalRecord, PersistenceSink};
use crate::source::ImageSource;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress percentages at fixed phase boundaries; batches fill 10–90.
const PCT_PREPARED: u8 = 5;
const PCT_EXTRACT_START: usize = 10;
const PCT_EXTRACT_SPAN: usize = 80;
const PCT_FINALIZING: u8 = 95;

/// Processes documents with injected service, image source and sink.
///
/// Holds no per-document state; concurrent calls to [`Self::process`] on
/// different documents do not interfere.
pub struct ExtractionPipeline {
    config: ExtractionConfig,
    client: ModelClient,
    images: Arc<dyn ImageSource>,
    sink: Arc<dyn PersistenceSink>,
    synthesizer: FallbackSynthesizer,
}

/// Mutable state for one document, owned by one `process` call.
struct DocumentRun {
    progress: PipelineProgress,
    stats: ExtractionStats,
    batches: Vec<BatchOutcome>,
}

impl ExtractionPipeline {
    pub fn new(
        config: ExtractionConfig,
        service: Arc<dyn ExtractionService>,
        images: Arc<dyn ImageSource>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            client: ModelClient::new(service, &config),
            synthesizer: FallbackSynthesizer::new(config.reference_year),
            config,
            images,
            sink,
        }
    }

    /// Extract one document.
    ///
    /// # Errors
    /// Only for input validation failures, before any page is listed or
    /// submitted. Everything later degrades into the returned record.
    pub async fn process(
        &self,
        doc: &DocumentRef,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutput, SapsError> {
        let started = Instant::now();
        let deadline = self
            .config
            .deadline_secs
            .map(|secs| started + Duration::from_secs(secs));
        let noop = NoopProgressCallback;
        let cb: &dyn ExtractionProgressCallback = match self.config.progress_callback {
            Some(ref cb) => cb.as_ref(),
            None => &noop,
        };

        // ── Step 1: Validate input ───────────────────────────────────────
        validate_document(doc)?;
        info!("Processing document {} ({})", doc.id, doc.file_name);
        cb.on_update(&ProgressUpdate::new("Validating", 0));

        // ── Step 2: List page images ─────────────────────────────────────
        let listed = match self.images.list_page_images(doc).await {
            Ok(urls) => urls,
            Err(SourceError::DocumentMissing { reference }) => {
                return Err(InputError::MissingDocument { reference }.into());
            }
            Err(e @ SourceError::Unavailable { .. }) => {
                warn!("{}; treating {} as empty", e, doc.id);
                Vec::new()
            }
        };

        let mut run = DocumentRun {
            progress: PipelineProgress::default(),
            stats: ExtractionStats {
                listed_images: listed.len(),
                ..Default::default()
            },
            batches: Vec::new(),
        };

        // ── Step 3: Filter and batch ─────────────────────────────────────
        let filtered = filter_images(listed);
        run.stats.valid_images = filtered.valid.len();
        run.stats.invalid_images = filtered.invalid.len();
        run.stats.unsupported_images = filtered.unsupported.len();

        let rejected = filtered.rejected();
        let page_count = filtered.valid.len();
        let mut reason = None;

        match prepare_batches(filtered.valid, self.config.batch_size, rejected) {
            Err(e) => {
                warn!("{}: {}", doc.id, e);
                cb.on_update(
                    &ProgressUpdate::new("Preparing", PCT_PREPARED)
                        .with_details(format!("no usable pages ({} rejected)", rejected)),
                );
                reason = Some(FallbackReason::EmptyDocument);
            }
            Ok(jobs) => {
                info!(
                    "Document {}: {} pages in {} batches of up to {}",
                    doc.id,
                    page_count,
                    jobs.len(),
                    self.config.batch_size
                );
                run.progress = PipelineProgress::new(jobs.len(), page_count);
                run.stats.total_batches = jobs.len();
                cb.on_update(
                    &ProgressUpdate::new("Preparing", PCT_PREPARED)
                        .with_details(format!("{} pages, {} batches", page_count, jobs.len())),
                );

                // ── Step 4: Extract batch by batch ───────────────────────
                self.extract_batches(doc, &jobs, cancel, deadline, cb, &mut run)
                    .await;

                let submitted = run.stats.batches_submitted;
                if submitted > 0 && run.stats.batches_failed == submitted {
                    reason = Some(FallbackReason::AllBatchesFailed);
                }
            }
        }

        // ── Step 5: Finalize ─────────────────────────────────────────────
        cb.on_update(&ProgressUpdate::new("Finalizing", PCT_FINALIZING));
        let (record, applied) = finalize(
            run.progress.combined.clone(),
            doc,
            reason,
            &self.synthesizer,
        );
        run.stats.fallback = applied;

        let archive = self.config.archive_raw_responses && !run.batches.is_empty();
        let response_artifact_url = if archive {
            match self
                .sink
                .archive_response(&doc.id, &archive_text(&run.batches))
                .await
            {
                Ok(url) => url,
                Err(e) => {
                    warn!("Archiving raw responses for {} failed: {}", doc.id, e);
                    run.stats.sink_failures += 1;
                    None
                }
            }
        } else {
            None
        };

        run.stats.total_input_tokens = run.batches.iter().map(|b| b.input_tokens).sum();
        run.stats.total_output_tokens = run.batches.iter().map(|b| b.output_tokens).sum();
        run.stats.total_duration_ms = started.elapsed().as_millis() as u64;

        let final_record = FinalRecord {
            document_id: doc.id.clone(),
            record: record.clone(),
            response_artifact_url: response_artifact_url.clone(),
            stats: run.stats.clone(),
            completed_at: Utc::now(),
        };
        if let Err(e) = self.sink.record_final(&final_record).await {
            warn!("Persisting final record for {} failed: {}", doc.id, e);
            run.stats.sink_failures += 1;
        }

        info!(
            "Document {} done: {}/{} batches submitted, {} failed, origin {:?}, {}ms",
            doc.id,
            run.stats.batches_submitted,
            run.stats.total_batches,
            run.stats.batches_failed,
            record.origin,
            run.stats.total_duration_ms
        );
        cb.on_update(&ProgressUpdate::new("Complete", 100));
        cb.on_complete(&record);

        Ok(ExtractionOutput {
            record,
            batches: run.batches,
            progress: run.progress,
            stats: run.stats,
            response_artifact_url,
        })
    }

    async fn extract_batches(
        &self,
        doc: &DocumentRef,
        jobs: &[DocumentBatchJob],
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        cb: &dyn ExtractionProgressCallback,
        run: &mut DocumentRun,
    ) {
        let total = jobs.len();

        for job in jobs {
            if cancel.is_cancelled() {
                info!("Document {}: cancelled before batch {}", doc.id, job.batch_index());
                run.stats.cancelled = true;
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!("Document {}: deadline reached before batch {}", doc.id, job.batch_index());
                run.stats.cancelled = true;
                break;
            }

            cb.on_batch_start(job.batch_index(), total);
            let outcome = self.client.submit(job).await;
            run.stats.batches_submitted += 1;

            match (&outcome.parsed, &outcome.error) {
                (Some(parsed), _) => {
                    let combined = std::mem::take(&mut run.progress.combined);
                    run.progress.combined = merge(combined, parsed);
                }
                (None, error) => {
                    run.stats.batches_failed += 1;
                    let msg = error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no result".to_string());
                    cb.on_batch_error(job.batch_index(), total, &msg);
                }
            }
            run.progress.processed_batches += 1;
            run.progress.processed_pages += job.len();

            if let Err(e) = self
                .sink
                .record_batch(&BatchLog::from_outcome(&doc.id, &outcome))
                .await
            {
                warn!("Batch {}: persisting log failed: {}", job.batch_index(), e);
                run.stats.sink_failures += 1;
            }

            cb.on_batch_complete(&outcome, &run.progress);
            let pct = PCT_EXTRACT_START + PCT_EXTRACT_SPAN * run.progress.processed_batches / total;
            cb.on_update(
                &ProgressUpdate::new("Extracting", pct as u8).with_batch(BatchProgress {
                    current_batch: job.batch_index(),
                    total_batches: total,
                    pages_processed: run.progress.processed_pages,
                    total_pages: run.progress.total_pages,
                }),
            );
            run.batches.push(outcome);

            if self.config.early_exit
                && run.progress.processed_batches < total
                && is_complete(&run.progress.combined)
            {
                info!(
                    "Document {}: all required fields found after batch {}/{}; skipping the rest",
                    doc.id,
                    job.batch_index(),
                    total
                );
                run.stats.early_exit = true;
                break;
            }
        }

        run.stats.batches_skipped = total - run.stats.batches_submitted;
        debug!(
            "Document {}: {} batches skipped",
            doc.id, run.stats.batches_skipped
        );
    }

    /// Synchronous wrapper around [`Self::process`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn process_blocking(
        &self,
        doc: &DocumentRef,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutput, SapsError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| SapsError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process(doc, cancel))
    }
}

/// All raw replies with batch headers, for the audit archive.
fn archive_text(batches: &[BatchOutcome]) -> String {
    let mut out = String::new();
    for b in batches {
        out.push_str(&format!(
            "=== Batch {}/{} ({} images) ===\n",
            b.batch_index, b.total_batches, b.image_count
        ));
        match &b.error {
            Some(e) if b.raw_text.is_empty() => out.push_str(&format!("[error] {}\n", e)),
            _ => {
                out.push_str(&b.raw_text);
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

/// Pick the extraction service, from most-specific to least-specific.
///
/// 1. A named provider other than `anthropic` goes through `edgequake_llm`.
/// 2. Otherwise the direct Messages API client, if `ANTHROPIC_API_KEY` is set.
/// 3. Otherwise `EDGEQUAKE_LLM_PROVIDER` (with `EDGEQUAKE_MODEL`, or the
///    configured model) from the environment.
pub fn resolve_service(
    config: &ExtractionConfig,
    provider_name: Option<&str>,
) -> Result<Arc<dyn ExtractionService>, SapsError> {
    if let Some(name) = provider_name.filter(|n| !n.eq_ignore_ascii_case("anthropic")) {
        return Ok(Arc::new(LlmProviderService::from_name(name, &config.model)?));
    }

    let direct = AnthropicService::from_env();
    if direct.is_ok() || provider_name.is_some() {
        return Ok(Arc::new(direct?));
    }

    match std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        Ok(prov) if !prov.is_empty() => {
            let model = std::env::var("EDGEQUAKE_MODEL")
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| config.model.clone());
            Ok(Arc::new(LlmProviderService::from_name(&prov, &model)?))
        }
        _ => Err(SapsError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: "Set ANTHROPIC_API_KEY, or EDGEQUAKE_LLM_PROVIDER with that provider's API key"
                .to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BatchError;

    fn outcome(batch: usize, raw: &str, error: Option<BatchError>) -> BatchOutcome {
        BatchOutcome {
            batch_index: batch,
            total_batches: 2,
            image_count: 20,
            parsed: None,
            schema: None,
            raw_text: raw.into(),
            success: error.is_none(),
            error,
            attempts: 1,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        }
    }

    #[test]
    fn archive_has_headers_and_errors() {
        let text = archive_text(&[
            outcome(1, "{\"applicantName\": \"X\"}", None),
            outcome(
                2,
                "",
                Some(BatchError::Rejected {
                    batch: 2,
                    status: 500,
                    body: "boom".into(),
                }),
            ),
        ]);
        assert!(text.starts_with("=== Batch 1/2 (20 images) ===\n{\"applicantName\""));
        assert!(text.contains(
            "=== Batch 2/2 (20 images) ===\n[error] Batch 2: rejected with HTTP 500: boom"
        ));
    }
}
