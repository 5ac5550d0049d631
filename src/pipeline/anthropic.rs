//! HTTP extraction service speaking the Anthropic Messages API.
//!
//! Page images go upstream as URL sources, so the request body stays small
//! regardless of scan resolution. Status 529 is the service's overload signal
//! and the only one the model client retries; any other non-2xx status is
//! returned with its body untouched.

use crate::error::{SapsError, ServiceError};
use crate::pipeline::llm::{ExtractionService, ServiceReply};
use crate::pipeline::request::ExtractionRequest;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const API_VERSION: &str = "2023-06-01";
const OVERLOADED: u16 = 529;

pub struct AnthropicService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl AnthropicService {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Result<Self, SapsError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SapsError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Read `ANTHROPIC_API_KEY` and, optionally, `ANTHROPIC_BASE_URL`.
    pub fn from_env() -> Result<Self, SapsError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SapsError::ProviderNotConfigured {
                provider: "anthropic".to_string(),
                hint: "Set ANTHROPIC_API_KEY".to_string(),
            })?;
        let endpoint = match std::env::var("ANTHROPIC_BASE_URL") {
            Ok(base) if !base.trim().is_empty() => {
                format!("{}/v1/messages", base.trim_end_matches('/'))
            }
            _ => DEFAULT_ENDPOINT.to_string(),
        };
        Self::new(api_key, endpoint)
    }
}

#[async_trait]
impl ExtractionService for AnthropicService {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, request: &ExtractionRequest) -> Result<ServiceReply, ServiceError> {
        let body = request
            .to_messages_body()
            .map_err(|e| ServiceError::Transport {
                detail: format!("request encoding failed: {e}"),
            })?;
        debug!(
            "Batch {}: POST {} ({} bytes)",
            request.batch_index,
            self.endpoint,
            body.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport {
                detail: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| ServiceError::Transport {
            detail: format!("reading response body: {e}"),
        })?;
        classify(status, &bytes)
    }
}

#[derive(Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Map a status code and body to a reply or a wire-level error.
fn classify(status: u16, body: &[u8]) -> Result<ServiceReply, ServiceError> {
    if status == OVERLOADED {
        return Err(ServiceError::Overloaded {
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }
    if !(200..300).contains(&status) {
        return Err(ServiceError::Status {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    let reply: MessagesReply = serde_json::from_slice(body).map_err(|e| ServiceError::Transport {
        detail: format!("malformed Messages API response: {e}"),
    })?;
    let text = reply
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(ServiceReply {
        text,
        input_tokens: reply.usage.input_tokens,
        output_tokens: reply.usage.output_tokens,
    })
}
