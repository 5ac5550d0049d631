//! Model client: submit one batch to the extraction service.
//!
//! The service itself is a trait object ([`ExtractionService`]) so the
//! coordinator can be driven by the HTTP implementation in
//! [`crate::pipeline::anthropic`], by any `edgequake_llm` provider via
//! [`crate::pipeline::provider`], or by a scripted mock in tests.
//!
//! ## Retry Strategy
//!
//! Only "service overloaded" (HTTP 529) is retried, with exponential backoff
//! `initial_backoff_ms * 2^retry`: 2 s → 4 s → 8 s with the defaults, for at
//! most 4 attempts. Every other failure is surfaced immediately with the
//! upstream body intact. A timeout ends the batch: the request may still be
//! running upstream, and resubmitting it would bill the same pages twice.

use crate::config::{ExtractionConfig, RetryPolicy};
use crate::error::{BatchError, ServiceError};
use crate::output::BatchOutcome;
use crate::pipeline::batch::DocumentBatchJob;
use crate::pipeline::parse;
use crate::pipeline::request::{ExtractionRequest, RequestBuilder};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// A successful reply from the extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceReply {
    /// Free-form text expected to embed one JSON object.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The upstream vision model, reduced to one request/response call.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Send one request; no retries at this level.
    async fn send(&self, request: &ExtractionRequest) -> Result<ServiceReply, ServiceError>;
}

/// Result of one batch call including how many attempts it took.
#[derive(Debug, Clone)]
pub struct CallReport {
    pub attempts: u32,
    pub result: Result<ServiceReply, BatchError>,
}

/// Applies the retry and timeout policy around an [`ExtractionService`].
#[derive(Clone)]
pub struct ModelClient {
    service: Arc<dyn ExtractionService>,
    builder: RequestBuilder,
    retry: RetryPolicy,
    config: ExtractionConfig,
}

impl ModelClient {
    pub fn new(service: Arc<dyn ExtractionService>, config: &ExtractionConfig) -> Self {
        Self {
            service,
            builder: RequestBuilder::new(config),
            retry: config.retry,
            config: config.clone(),
        }
    }

    /// Submit a batch and parse the reply.
    ///
    /// Always returns a `BatchOutcome`, never an error, so one bad batch
    /// does not abort the document.
    pub async fn submit(&self, job: &DocumentBatchJob) -> BatchOutcome {
        let start = Instant::now();
        let report = self.call(job).await;
        let batch = job.batch_index();

        let mut outcome = BatchOutcome {
            batch_index: batch,
            total_batches: job.total_batches(),
            image_count: job.len(),
            parsed: None,
            schema: None,
            raw_text: String::new(),
            success: false,
            error: None,
            attempts: report.attempts,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        };

        match report.result {
            Ok(reply) => {
                outcome.input_tokens = reply.input_tokens;
                outcome.output_tokens = reply.output_tokens;
                match parse::parse_response(&reply.text) {
                    Some(parsed) => {
                        debug!("Batch {}: parsed with {:?} schema", batch, parsed.schema);
                        outcome.schema = Some(parsed.schema);
                        outcome.parsed = Some(parsed.record);
                        outcome.success = true;
                    }
                    None => {
                        warn!("Batch {}: reply contained no recognisable JSON", batch);
                        outcome.error = Some(BatchError::Unparseable { batch });
                    }
                }
                outcome.raw_text = reply.text;
            }
            Err(e) => {
                warn!("Batch {}: {}", batch, e);
                outcome.error = Some(e);
            }
        }

        outcome.duration_ms = start.elapsed().as_millis() as u64;
        outcome
    }

    /// Call the service for one batch, retrying only on overload.
    pub async fn call(&self, job: &DocumentBatchJob) -> CallReport {
        let batch = job.batch_index();
        let request = self.builder.build(job);
        let limit = self.config.timeout_for(job.len());

        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                let backoff = self.retry.delay_for(attempt - 1);
                warn!(
                    "Batch {}: retry {}/{} after {}ms (service overloaded)",
                    batch,
                    attempt,
                    self.retry.max_retries,
                    backoff.as_millis()
                );
                sleep(backoff).await;
            }
            attempt += 1;

            let result = match timeout(limit, self.service.send(&request)).await {
                Err(_) => {
                    return CallReport {
                        attempts: attempt,
                        result: Err(BatchError::Timeout {
                            batch,
                            secs: limit.as_secs(),
                        }),
                    }
                }
                Ok(result) => result,
            };

            match result {
                Ok(reply) => {
                    debug!(
                        "Batch {}: {} images via {}, {} input tokens, {} output tokens",
                        batch,
                        job.len(),
                        self.service.name(),
                        reply.input_tokens,
                        reply.output_tokens
                    );
                    return CallReport {
                        attempts: attempt,
                        result: Ok(reply),
                    };
                }
                Err(ServiceError::Overloaded { body }) => {
                    if attempt > self.retry.max_retries {
                        return CallReport {
                            attempts: attempt,
                            result: Err(BatchError::RetriesExhausted {
                                batch,
                                attempts: attempt,
                                body,
                            }),
                        };
                    }
                }
                Err(ServiceError::Status { status, body }) => {
                    return CallReport {
                        attempts: attempt,
                        result: Err(BatchError::Rejected { batch, status, body }),
                    };
                }
                Err(ServiceError::Transport { detail }) => {
                    return CallReport {
                        attempts: attempt,
                        result: Err(BatchError::Transport { batch, detail }),
                    };
                }
            }
        }
    }
}
