//! Extraction service backed by any `edgequake_llm` vision provider.
//!
//! Providers reached through `edgequake_llm` take images as inline base64
//! data, so each page is fetched (http/https) or read (file) and encoded
//! before the call. Provider errors arrive as opaque messages; an overload
//! is recognised from the message text and everything else is a transport
//! failure.

use crate::error::{SapsError, ServiceError};
use crate::pipeline::batch::ImageRef;
use crate::pipeline::llm::{ExtractionService, ServiceReply};
use crate::pipeline::request::ExtractionRequest;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use reqwest::Url;
use std::sync::Arc;
use tracing::debug;

pub struct LlmProviderService {
    provider: Arc<dyn LLMProvider>,
    client: reqwest::Client,
    label: String,
}

impl LlmProviderService {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
            label: label.into(),
        }
    }

    /// Instantiate a named provider (`"openai"`, `"gemini"`, …) for `model`.
    ///
    /// The provider reads its own API key variable from the environment.
    pub fn from_name(provider_name: &str, model: &str) -> Result<Self, SapsError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            SapsError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, provider_name))
    }

    async fn inline(&self, image: &ImageRef) -> Result<ImageData, ServiceError> {
        let url = Url::parse(&image.url).map_err(|e| ServiceError::Transport {
            detail: format!("page {}: bad image URL: {e}", image.page),
        })?;

        let bytes = if url.scheme() == "file" {
            let path = url.to_file_path().map_err(|_| ServiceError::Transport {
                detail: format!("page {}: not a local path: {}", image.page, image.url),
            })?;
            tokio::fs::read(&path)
                .await
                .map_err(|e| ServiceError::Transport {
                    detail: format!("page {}: reading {}: {e}", image.page, path.display()),
                })?
        } else {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| ServiceError::Transport {
                    detail: format!("page {}: fetching image: {e}", image.page),
                })?;
            response
                .bytes()
                .await
                .map_err(|e| ServiceError::Transport {
                    detail: format!("page {}: reading image: {e}", image.page),
                })?
                .to_vec()
        };

        let b64 = STANDARD.encode(&bytes);
        debug!("Page {}: inlined {} bytes as base64", image.page, bytes.len());
        Ok(ImageData::new(b64, image.media_type.as_str()).with_detail("high"))
    }
}

#[async_trait]
impl ExtractionService for LlmProviderService {
    fn name(&self) -> &str {
        &self.label
    }

    async fn send(&self, request: &ExtractionRequest) -> Result<ServiceReply, ServiceError> {
        let mut images = Vec::with_capacity(request.images.len());
        for image in &request.images {
            images.push(self.inline(image).await?);
        }

        let pages: Vec<String> = request.images.iter().map(|i| i.page.to_string()).collect();
        let text = format!(
            "Images in order are pages {}.\n\n{}",
            pages.join(", "),
            request.instruction
        );
        let messages = vec![
            ChatMessage::system(request.system),
            ChatMessage::user_with_images(&text, images),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => Ok(ServiceReply {
                text: response.content,
                input_tokens: response.prompt_tokens as u64,
                output_tokens: response.completion_tokens as u64,
            }),
            Err(e) => Err(classify_error(&e.to_string())),
        }
    }
}

fn classify_error(message: &str) -> ServiceError {
    let lower = message.to_lowercase();
    if lower.contains("529") || lower.contains("overloaded") {
        ServiceError::Overloaded {
            body: message.to_string(),
        }
    } else {
        ServiceError::Transport {
            detail: message.to_string(),
        }
    }
}
