//! Coordinator integration tests with in-process mocks.
//!
//! The extraction service is scripted per batch index, so each test states
//! exactly what the model "said" for every batch and then checks which calls
//! were made and what record came out.

use async_trait::async_trait;
use saps_extract::pipeline::request::ExtractionRequest;
use saps_extract::{
    BatchError, BatchOutcome, DataOrigin, DirectorySink, DocumentRef, ExtractionConfig,
    ExtractionFieldSet, ExtractionPipeline, ExtractionProgressCallback, ExtractionService,
    FallbackReason, ImageSource, InputError, MemorySink, PersistenceSink, PipelineProgress,
    ProgressUpdate, RequiredField, SapsError, ServiceError, ServiceReply, SinkError, Slot,
    SourceError, StaticImageSource, WatchProgress,
};
use saps_extract::sink::{BatchLog, FinalRecord};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ── Mocks ────────────────────────────────────────────────────────────────────

/// Replies scripted per batch index; unscripted batches get prose with no JSON.
#[derive(Default)]
struct Scripted {
    script: Mutex<HashMap<usize, VecDeque<Result<ServiceReply, ServiceError>>>>,
    calls: Mutex<Vec<usize>>,
    delay: Option<Duration>,
}

impl Scripted {
    fn new() -> Self {
        Self::default()
    }

    fn on(self, batch: usize, reply: Result<ServiceReply, ServiceError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(batch)
            .or_default()
            .push_back(reply);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionService for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: &ExtractionRequest) -> Result<ServiceReply, ServiceError> {
        self.calls.lock().unwrap().push(request.batch_index);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.script
            .lock()
            .unwrap()
            .get_mut(&request.batch_index)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| ok("These pages contain no application data."))
    }
}

struct FailingSource(SourceError);

#[async_trait]
impl ImageSource for FailingSource {
    async fn list_page_images(&self, _doc: &DocumentRef) -> Result<Vec<String>, SourceError> {
        Err(self.0.clone())
    }
}

/// Rejects every write.
struct BrokenSink;

#[async_trait]
impl PersistenceSink for BrokenSink {
    async fn record_batch(&self, _log: &BatchLog) -> Result<(), SinkError> {
        Err(SinkError("disk full".into()))
    }

    async fn archive_response(
        &self,
        _document_id: &str,
        _raw: &str,
    ) -> Result<Option<String>, SinkError> {
        Err(SinkError("disk full".into()))
    }

    async fn record_final(&self, _record: &FinalRecord) -> Result<(), SinkError> {
        Err(SinkError("disk full".into()))
    }
}

#[derive(Default)]
struct Recorder {
    steps: Mutex<Vec<String>>,
    percents: Mutex<Vec<u8>>,
    processed: Mutex<Vec<usize>>,
    errors: Mutex<Vec<usize>>,
    completed: Mutex<Option<ExtractionFieldSet>>,
}

impl ExtractionProgressCallback for Recorder {
    fn on_update(&self, update: &ProgressUpdate) {
        self.steps.lock().unwrap().push(update.step.clone());
        self.percents.lock().unwrap().push(update.progress);
    }

    fn on_batch_complete(&self, _outcome: &BatchOutcome, progress: &PipelineProgress) {
        self.processed.lock().unwrap().push(progress.processed_batches);
    }

    fn on_batch_error(&self, batch_index: usize, _total: usize, _error: &str) {
        self.errors.lock().unwrap().push(batch_index);
    }

    fn on_complete(&self, record: &ExtractionFieldSet) {
        *self.completed.lock().unwrap() = Some(record.clone());
    }
}

struct CancelAfter {
    token: CancellationToken,
    batch: usize,
}

impl ExtractionProgressCallback for CancelAfter {
    fn on_batch_complete(&self, outcome: &BatchOutcome, _progress: &PipelineProgress) {
        if outcome.batch_index == self.batch {
            self.token.cancel();
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn ok(text: &str) -> Result<ServiceReply, ServiceError> {
    Ok(ServiceReply {
        text: text.to_string(),
        input_tokens: 1000,
        output_tokens: 100,
    })
}

fn status(code: u16, body: &str) -> Result<ServiceReply, ServiceError> {
    Err(ServiceError::Status {
        status: code,
        body: body.to_string(),
    })
}

fn urls(pages: usize) -> Vec<String> {
    (1..=pages)
        .map(|i| format!("https://cdn.example.com/saps/doc-1/page-{i:03}.png"))
        .collect()
}

fn doc() -> DocumentRef {
    DocumentRef::new("doc-1", "abc123", "kerelem.pdf", 482_113)
}

fn base_config() -> saps_extract::ExtractionConfigBuilder {
    ExtractionConfig::builder().reference_year(2024)
}

fn pipeline_with(
    config: ExtractionConfig,
    service: Arc<Scripted>,
    pages: Vec<String>,
    sink: Arc<MemorySink>,
) -> ExtractionPipeline {
    let images = StaticImageSource::new().with_document("doc-1", pages);
    ExtractionPipeline::new(config, service, Arc::new(images), sink)
}

const COMPLETE_LEGACY: &str = r#"{
    "applicantName": "Kovács János",
    "submitterId": "1001234567",
    "applicantId": "2009876543",
    "hectares": 82.5,
    "cultures": [{"name": "Búza", "hectares": 50}, {"name": "Napraforgó", "hectares": 32.5}],
    "blockIds": ["K1234567", "L7654321"]
}"#;

// ── Early exit ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn early_exit_skips_remaining_batches() {
    let service = Arc::new(
        Scripted::new()
            .on(1, ok(r#"{"applicantName": "Kovács János"}"#))
            .on(2, ok(COMPLETE_LEGACY)),
    );
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        service.clone(),
        urls(100),
        Arc::new(MemorySink::new()),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();

    assert_eq!(service.calls(), vec![1, 2]);
    assert!(out.stats.early_exit);
    assert_eq!(out.stats.total_batches, 5);
    assert_eq!(out.stats.batches_skipped, 3);
    assert_eq!(out.record.origin, DataOrigin::Extracted);
    assert!(out.record.missing_required.is_empty());
    assert!(out.record.error_message.is_none());
    assert!(out.is_genuine());
}

#[tokio::test]
async fn early_exit_can_be_disabled() {
    let service = Arc::new(Scripted::new().on(1, ok(COMPLETE_LEGACY)));
    let pipeline = pipeline_with(
        base_config().early_exit(false).build().unwrap(),
        service.clone(),
        urls(60),
        Arc::new(MemorySink::new()),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();
    assert_eq!(service.calls(), vec![1, 2, 3]);
    assert!(!out.stats.early_exit);
    assert_eq!(out.record.applicant_name, Slot::Known("Kovács János".into()));
}

// ── End-to-end merge with a failed batch ─────────────────────────────────────

#[tokio::test]
async fn partial_batches_merge_and_report_missing_ids() {
    let service = Arc::new(
        Scripted::new()
            .on(1, ok(r#"{"applicantName": "Teszt Gazda"}"#))
            .on(2, status(500, r#"{"type":"error","error":{"type":"api_error"}}"#))
            .on(
                3,
                ok(r#"{"hectares": 50, "cultures": [{"name": "Búza", "hectares": 50}], "blockIds": ["K1234567"]}"#),
            ),
    );
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        service.clone(),
        urls(45),
        Arc::new(MemorySink::new()),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();
    let rec = &out.record;

    assert_eq!(service.calls(), vec![1, 2, 3], "HTTP 500 must not be retried");
    assert_eq!(rec.applicant_name, Slot::Known("Teszt Gazda".into()));
    assert_eq!(rec.hectares, Slot::Known(50.0));
    assert_eq!(rec.cultures.len(), 1);
    assert_eq!(rec.cultures[0].name, "Búza");
    assert_eq!(rec.block_ids, vec!["K1234567"]);
    assert_eq!(rec.submitter_id, Slot::NotAvailable);
    assert_eq!(rec.applicant_id, Slot::NotAvailable);
    assert_eq!(
        rec.missing_required,
        vec![RequiredField::SubmitterId, RequiredField::ApplicantId]
    );
    assert!(rec
        .error_message
        .as_deref()
        .is_some_and(|m| m.starts_with("Required fields still missing")));
    assert_eq!(rec.origin, DataOrigin::Extracted);
    assert_eq!(rec.total_revenue, Slot::Known(50.0 * 5.5 * 75_000.0));

    assert_eq!(out.stats.batches_failed, 1);
    assert_eq!(out.stats.fallback, None);
    assert!(matches!(
        out.batches[1].error,
        Some(BatchError::Rejected { status: 500, ref body, .. }) if body.contains("api_error")
    ));
}

// ── Fallback paths ───────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_document_gets_synthetic_record_without_calls() {
    let service = Arc::new(Scripted::new());
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        service.clone(),
        vec![
            "not a url".to_string(),
            "ftp://cdn.example.com/p1.png".to_string(),
            "https://cdn.example.com/p2.tiff".to_string(),
        ],
        Arc::new(MemorySink::new()),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();

    assert!(service.calls().is_empty());
    assert!(out.batches.is_empty());
    assert_eq!(out.stats.invalid_images, 2);
    assert_eq!(out.stats.unsupported_images, 1);
    assert_eq!(out.stats.fallback, Some(FallbackReason::EmptyDocument));
    assert_eq!(out.record.origin, DataOrigin::Synthetic);
    assert!(out.record.data_unavailable);
    assert!(!out.is_genuine());
}

#[tokio::test]
async fn empty_document_still_reports_every_phase() {
    let recorder = Arc::new(Recorder::default());
    let config = base_config()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let pipeline = pipeline_with(
        config,
        Arc::new(Scripted::new()),
        vec!["not a url".to_string()],
        Arc::new(MemorySink::new()),
    );

    pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();

    assert_eq!(
        *recorder.steps.lock().unwrap(),
        vec!["Validating", "Preparing", "Finalizing", "Complete"]
    );
    let percents = recorder.percents.lock().unwrap().clone();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "got {percents:?}");
}

#[tokio::test]
async fn unavailable_source_degrades_to_empty_document() {
    let service = Arc::new(Scripted::new());
    let pipeline = ExtractionPipeline::new(
        base_config().build().unwrap(),
        service.clone(),
        Arc::new(FailingSource(SourceError::Unavailable {
            detail: "conversion service down".into(),
        })),
        Arc::new(MemorySink::new()),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();
    assert!(service.calls().is_empty());
    assert_eq!(out.stats.fallback, Some(FallbackReason::EmptyDocument));
    assert_eq!(out.record.origin, DataOrigin::Synthetic);
}

#[tokio::test]
async fn all_batches_failed_gets_synthetic_record() {
    let service = Arc::new(
        Scripted::new()
            .on(1, status(400, "bad request"))
            .on(2, status(400, "bad request")),
    );
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        service.clone(),
        urls(30),
        Arc::new(MemorySink::new()),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();

    assert_eq!(service.calls(), vec![1, 2]);
    assert_eq!(out.stats.batches_failed, 2);
    assert_eq!(out.stats.fallback, Some(FallbackReason::AllBatchesFailed));
    assert_eq!(out.record.origin, DataOrigin::Synthetic);
    assert!(out.record.total_revenue.is_populated());
}

#[tokio::test]
async fn implausible_area_is_replaced_not_fatal() {
    let service = Arc::new(
        Scripted::new().on(1, ok(r#"{"applicantName":"X","hectares":1e17,"blockIds":["K1"]}"#)),
    );
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        service,
        urls(3),
        Arc::new(MemorySink::new()),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();
    let rec = &out.record;

    assert_eq!(rec.origin, DataOrigin::Augmented);
    assert_eq!(rec.applicant_name, Slot::Known("X".into()));
    assert_eq!(rec.block_ids, vec!["K1"]);
    let hectares = *rec.hectares.known().unwrap();
    assert!(hectares > 0.0 && hectares < 1_000.0, "got {hectares}");
    assert!((rec.culture_hectares() - hectares).abs() < 1e-9);
    assert!(rec.synthesized_fields.contains(&"hectares".to_string()));
}

#[tokio::test]
async fn synthetic_record_is_stable_across_runs() {
    let run = || async {
        let pipeline = pipeline_with(
            base_config().build().unwrap(),
            Arc::new(Scripted::new()),
            Vec::new(),
            Arc::new(MemorySink::new()),
        );
        pipeline
            .process(&doc(), &CancellationToken::new())
            .await
            .unwrap()
            .record
    };
    let a = serde_json::to_vec(&run().await).unwrap();
    let b = serde_json::to_vec(&run().await).unwrap();
    assert_eq!(a, b);
}

#[tokio::test(start_paused = true)]
async fn persistent_overload_exhausts_retries_then_falls_back() {
    let overloaded = || {
        Err(ServiceError::Overloaded {
            body: r#"{"type":"error","error":{"type":"overloaded_error"}}"#.into(),
        })
    };
    let service = Arc::new(
        Scripted::new()
            .on(1, overloaded())
            .on(1, overloaded())
            .on(1, overloaded())
            .on(1, overloaded()),
    );
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        service.clone(),
        urls(3),
        Arc::new(MemorySink::new()),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();

    assert_eq!(service.calls(), vec![1, 1, 1, 1]);
    assert_eq!(out.batches[0].attempts, 4);
    assert!(matches!(
        out.batches[0].error,
        Some(BatchError::RetriesExhausted { attempts: 4, .. })
    ));
    assert_eq!(out.stats.fallback, Some(FallbackReason::AllBatchesFailed));
}

// ── Cancellation and deadline ────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_before_start_submits_nothing() {
    let service = Arc::new(Scripted::new().on(1, ok(COMPLETE_LEGACY)));
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        service.clone(),
        urls(40),
        Arc::new(MemorySink::new()),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let out = pipeline.process(&doc(), &cancel).await.unwrap();
    assert!(service.calls().is_empty());
    assert!(out.stats.cancelled);
    assert_eq!(out.stats.batches_skipped, 2);
    assert_eq!(out.record.origin, DataOrigin::Synthetic);
}

#[tokio::test]
async fn cancellation_between_batches_keeps_partial_work() {
    let cancel = CancellationToken::new();
    let service = Arc::new(
        Scripted::new().on(1, ok(r#"{"applicantName": "Teszt Gazda", "hectares": 30}"#)),
    );
    let config = base_config()
        .progress_callback(Arc::new(CancelAfter {
            token: cancel.clone(),
            batch: 1,
        }))
        .build()
        .unwrap();
    let pipeline = pipeline_with(config, service.clone(), urls(60), Arc::new(MemorySink::new()));

    let out = pipeline.process(&doc(), &cancel).await.unwrap();
    let rec = &out.record;

    assert_eq!(service.calls(), vec![1]);
    assert!(out.stats.cancelled);
    assert_eq!(out.stats.batches_skipped, 2);
    assert_eq!(rec.origin, DataOrigin::Augmented);
    assert_eq!(rec.applicant_name, Slot::Known("Teszt Gazda".into()));
    assert_eq!(rec.hectares, Slot::Known(30.0));
    assert!(rec.synthesized_fields.contains(&"cultures".to_string()));
    assert!((rec.culture_hectares() - 30.0).abs() < 1e-9);
    assert_eq!(out.stats.fallback, Some(FallbackReason::IncompleteExtraction));
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_between_batches() {
    let service = Arc::new(Scripted::new().with_delay(Duration::from_secs(40)));
    let pipeline = pipeline_with(
        base_config().deadline_secs(60).build().unwrap(),
        service.clone(),
        urls(60),
        Arc::new(MemorySink::new()),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();
    assert_eq!(service.calls(), vec![1, 2]);
    assert!(out.stats.cancelled);
    assert_eq!(out.stats.batches_skipped, 1);
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_is_monotonic_and_reported_per_batch() {
    let recorder = Arc::new(Recorder::default());
    let service = Arc::new(
        Scripted::new()
            .on(1, ok(r#"{"applicantName": "Teszt Gazda"}"#))
            .on(2, status(503, "unavailable")),
    );
    let config = base_config()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let pipeline = pipeline_with(config, service, urls(50), Arc::new(MemorySink::new()));

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();

    let percents = recorder.percents.lock().unwrap().clone();
    assert_eq!(percents.first(), Some(&0));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "got {percents:?}");
    assert_eq!(*recorder.processed.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(*recorder.errors.lock().unwrap(), vec![2, 3]);
    assert_eq!(recorder.completed.lock().unwrap().as_ref(), Some(&out.record));
    assert_eq!(out.progress.processed_pages, 50);
}

#[tokio::test]
async fn watch_progress_ends_complete() {
    let (progress, rx) = WatchProgress::channel();
    let config = base_config()
        .progress_callback(Arc::new(progress))
        .build()
        .unwrap();
    let service = Arc::new(Scripted::new().on(1, ok(COMPLETE_LEGACY)));
    let pipeline = pipeline_with(config, service, urls(5), Arc::new(MemorySink::new()));

    pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();
    let last = rx.borrow().clone();
    assert_eq!(last.progress, 100);
    assert_eq!(last.step, "Complete");
}

// ── Persistence ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn sink_receives_batch_logs_archive_and_final_record() {
    let sink = Arc::new(MemorySink::new());
    let service = Arc::new(
        Scripted::new()
            .on(1, ok("```json\n{\"applicantName\": \"Teszt Gazda\"}\n```"))
            .on(2, ok("Sorry, I cannot read these pages.")),
    );
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        service,
        urls(40),
        sink.clone(),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();

    let logs = sink.batches();
    assert_eq!(logs.len(), 2);
    assert!(logs[0].parsed.is_some());
    assert_eq!(logs[1].error, Some(BatchError::Unparseable { batch: 2 }));
    assert_eq!(logs[1].raw_text, "Sorry, I cannot read these pages.");

    let archives = sink.archives();
    assert_eq!(archives.len(), 1);
    assert!(archives[0].1.contains("=== Batch 1/2 (20 images) ==="));
    assert!(archives[0].1.contains("Sorry, I cannot read these pages."));
    assert_eq!(out.response_artifact_url.as_deref(), Some("memory://doc-1/1"));

    let finals = sink.finals();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].record, out.record);
    assert_eq!(finals[0].response_artifact_url, out.response_artifact_url);
    assert_eq!(out.stats.total_input_tokens, 2000);
}

#[tokio::test]
async fn failing_sink_is_counted_and_leaves_record_unchanged() {
    let script = || {
        Scripted::new()
            .on(1, ok(r#"{"applicantName": "Teszt Gazda"}"#))
            .on(2, status(500, "boom"))
            .on(3, ok(r#"{"hectares": 50, "cultures": [{"name": "Búza", "hectares": 50}]}"#))
    };
    let images = || Arc::new(StaticImageSource::new().with_document("doc-1", urls(45)));

    let working = ExtractionPipeline::new(
        base_config().build().unwrap(),
        Arc::new(script()),
        images(),
        Arc::new(MemorySink::new()),
    );
    let broken = ExtractionPipeline::new(
        base_config().build().unwrap(),
        Arc::new(script()),
        images(),
        Arc::new(BrokenSink),
    );

    let expected = working.process(&doc(), &CancellationToken::new()).await.unwrap();
    let out = broken.process(&doc(), &CancellationToken::new()).await.unwrap();

    assert_eq!(out.record, expected.record);
    assert_eq!(expected.stats.sink_failures, 0);
    assert_eq!(out.stats.batches_submitted, 3);
    assert_eq!(out.stats.sink_failures, out.stats.batches_submitted + 2);
    assert_eq!(out.response_artifact_url, None);
}

#[tokio::test]
async fn directory_sink_persists_record() {
    let dir = tempfile::tempdir().unwrap();
    let images = StaticImageSource::new().with_document("doc-1", urls(2));
    let pipeline = ExtractionPipeline::new(
        base_config().build().unwrap(),
        Arc::new(Scripted::new().on(1, ok(COMPLETE_LEGACY))),
        Arc::new(images),
        Arc::new(DirectorySink::new(dir.path())),
    );

    let out = pipeline.process(&doc(), &CancellationToken::new()).await.unwrap();

    let saved = std::fs::read_to_string(dir.path().join("doc-1/record.json")).unwrap();
    let saved: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved["record"]["applicantName"], "Kovács János");
    assert!(dir.path().join("doc-1/batch-001.json").exists());
    assert!(out
        .response_artifact_url
        .is_some_and(|u| u.starts_with("file://") && u.ends_with("responses.txt")));
}

// ── Fatal input errors ───────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_file_is_rejected_before_any_work() {
    let service = Arc::new(Scripted::new());
    let sink = Arc::new(MemorySink::new());
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        service.clone(),
        urls(5),
        sink.clone(),
    );
    let docx = DocumentRef::new("doc-1", "abc123", "kerelem.docx", 20_000);

    let err = pipeline
        .process(&docx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SapsError::Input(InputError::UnsupportedFileType { .. })
    ));
    assert!(service.calls().is_empty());
    assert!(sink.finals().is_empty());
}

#[tokio::test]
async fn unknown_document_is_fatal() {
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        Arc::new(Scripted::new()),
        urls(5),
        Arc::new(MemorySink::new()),
    );
    let other = DocumentRef::new("doc-404", "abc123", "kerelem.pdf", 1024);

    let err = pipeline
        .process(&other, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SapsError::Input(InputError::MissingDocument { ref reference }) if reference == "doc-404"
    ));
}

#[test]
fn blocking_wrapper_runs_pipeline() {
    let pipeline = pipeline_with(
        base_config().build().unwrap(),
        Arc::new(Scripted::new().on(1, ok(COMPLETE_LEGACY))),
        urls(3),
        Arc::new(MemorySink::new()),
    );
    let out = pipeline
        .process_blocking(&doc(), &CancellationToken::new())
        .unwrap();
    assert_eq!(out.record.origin, DataOrigin::Extracted);
}
