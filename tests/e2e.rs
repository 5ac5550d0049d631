//! End-to-end tests against a live vision model.
//!
//! These make real API calls, so they are gated behind `E2E_ENABLED` and
//! need page images the model can fetch:
//!
//!   E2E_ENABLED=1 ANTHROPIC_API_KEY=... \
//!   SAPS_E2E_IMAGES=https://host/p1.png,https://host/p2.png \
//!   cargo test --test e2e -- --nocapture
//!
//! Any `edgequake_llm` provider works instead of the direct client by also
//! setting `E2E_PROVIDER` (for example `openai`) and that provider's key.

use saps_extract::{
    resolve_service, DataOrigin, DocumentRef, ExtractionConfig, ExtractionPipeline, MemorySink,
    StaticImageSource,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip unless E2E_ENABLED is set and page images were supplied.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let images: Vec<String> = std::env::var("SAPS_E2E_IMAGES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if images.is_empty() {
            println!("SKIP: set SAPS_E2E_IMAGES to a comma-separated list of page URLs");
            return;
        }
        images
    }};
}

fn e2e_provider() -> Option<String> {
    std::env::var("E2E_PROVIDER").ok().filter(|p| !p.is_empty())
}

fn live_pipeline(
    config: ExtractionConfig,
    images: Vec<String>,
) -> (ExtractionPipeline, Arc<MemorySink>) {
    let service = resolve_service(&config, e2e_provider().as_deref())
        .expect("no extraction provider configured");
    let sink = Arc::new(MemorySink::new());
    let source = StaticImageSource::new().with_document("e2e-doc", images);
    (
        ExtractionPipeline::new(config, service, Arc::new(source), sink.clone()),
        sink,
    )
}

fn e2e_doc() -> DocumentRef {
    DocumentRef::new("e2e-doc", "e2e-user", "kerelem.pdf", 1_048_576)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_live_extraction_returns_record() {
    let images = e2e_skip_unless_ready!();
    let pages = images.len();
    let (pipeline, sink) = live_pipeline(ExtractionConfig::default(), images);

    let out = pipeline
        .process(&e2e_doc(), &CancellationToken::new())
        .await
        .expect("process failed");

    println!("{}", serde_json::to_string_pretty(&out.record).unwrap());
    println!(
        "batches: {} submitted, {} failed, {} skipped; tokens {} in / {} out",
        out.stats.batches_submitted,
        out.stats.batches_failed,
        out.stats.batches_skipped,
        out.stats.total_input_tokens,
        out.stats.total_output_tokens
    );

    assert_eq!(out.stats.valid_images, pages);
    assert!(out.stats.batches_submitted >= 1);
    assert_eq!(sink.batches().len(), out.stats.batches_submitted);
    assert_eq!(sink.finals().len(), 1);
    assert!(out.record.total_revenue.is_populated());
    let extracted_something = out
        .batches
        .iter()
        .any(|b| b.parsed.as_ref().is_some_and(|r| !r.is_blank()));
    if extracted_something {
        assert_ne!(
            out.record.origin,
            DataOrigin::Synthetic,
            "a batch yielded values, so the record must not be fully synthetic"
        );
    }
}

#[tokio::test]
async fn test_live_single_page_batches_stop_early() {
    let images = e2e_skip_unless_ready!();
    if images.len() < 2 {
        println!("SKIP: early-exit check needs at least two pages");
        return;
    }
    let total = images.len();
    let config = ExtractionConfig::builder().batch_size(1).build().unwrap();
    let (pipeline, _sink) = live_pipeline(config, images);

    let out = pipeline
        .process(&e2e_doc(), &CancellationToken::new())
        .await
        .expect("process failed");

    assert_eq!(out.stats.total_batches, total);
    assert_eq!(out.stats.batches_submitted + out.stats.batches_skipped, total);
    if out.stats.early_exit {
        assert!(out.record.missing_required.is_empty());
        assert!(out.stats.batches_skipped > 0);
    }
}
