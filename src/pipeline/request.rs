//! Extraction request construction.
//!
//! A request is a pure function of the batch, the model settings and the
//! prompt version. There is no per-call randomness, timestamp or request ID in
//! the body, so the same batch always serialises to the same bytes.

use crate::config::ExtractionConfig;
use crate::pipeline::batch::{DocumentBatchJob, ImageRef};
use crate::prompts::{batch_instruction, PROMPT_VERSION, SYSTEM_PROMPT};
use serde::Serialize;

/// Sampling temperature for every extraction call.
pub const TEMPERATURE: f32 = 0.0;

/// Everything an extraction service needs to process one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub batch_index: usize,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub prompt_version: &'static str,
    pub system: &'static str,
    /// Ordered page images.
    pub images: Vec<ImageRef>,
    /// Trailing user text.
    pub instruction: String,
}

/// Builds [`ExtractionRequest`]s from batch jobs.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    model: String,
    max_tokens: usize,
}

impl RequestBuilder {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    pub fn build(&self, job: &DocumentBatchJob) -> ExtractionRequest {
        ExtractionRequest {
            batch_index: job.batch_index(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: TEMPERATURE,
            prompt_version: PROMPT_VERSION,
            system: SYSTEM_PROMPT,
            images: job.images().to_vec(),
            instruction: batch_instruction(
                job.batch_index(),
                job.total_batches(),
                job.first_page(),
                job.len(),
            ),
        }
    }
}

// ── Messages API wire format ─────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: String },
    Image { source: UrlSource<'a> },
}

#[derive(Serialize)]
struct UrlSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    url: &'a str,
}

impl ExtractionRequest {
    /// Serialise as a Messages API request body.
    ///
    /// Each image is preceded by a short page label so the model can refer
    /// to pages by number; the batch instruction closes the user turn.
    pub fn to_messages_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut content = Vec::with_capacity(self.images.len() * 2 + 1);
        for image in &self.images {
            content.push(ContentPart::Text {
                text: format!("Page {}:", image.page),
            });
            content.push(ContentPart::Image {
                source: UrlSource {
                    kind: "url",
                    url: &image.url,
                },
            });
        }
        content.push(ContentPart::Text {
            text: self.instruction.clone(),
        });

        let body = MessagesBody {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: self.system,
            messages: [Message {
                role: "user",
                content,
            }],
        };
        serde_json::to_vec(&body)
    }
}
