//! Configuration types for SAPS document extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The extraction service, image source
//! and persistence sink are not part of the config; they are handed to
//! [`crate::extract::ExtractionPipeline::new`] directly.

use crate::error::SapsError;
use crate::progress::ProgressCallback;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Largest batch the extraction service accepts in one request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Default number of page images per request.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Default vision model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Retry policy for "service overloaded" responses.
///
/// Only HTTP 529 is retried. The wait before retry `n` (0-based) is
/// `initial_backoff_ms * 2^n`: 2 s → 4 s → 8 s with the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Default: 3 (4 attempts in total).
    pub max_retries: u32,
    /// Delay before the first retry. Default: 2000.
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

/// Configuration for one extraction pipeline.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use saps_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .batch_size(10)
///     .max_retries(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 10);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Page images per request. Range: 1–100. Default: 20.
    pub batch_size: usize,

    /// Model identifier sent with every request.
    pub model: String,

    /// Maximum tokens the model may generate per batch. Default: 4096.
    pub max_tokens: usize,

    /// Overload retry policy.
    pub retry: RetryPolicy,

    /// Per-call timeout in seconds. `None` scales with batch size
    /// (60 s + 6 s per image, at most 180 s).
    pub api_timeout_secs: Option<u64>,

    /// Overall deadline for one document, checked between batches.
    pub deadline_secs: Option<u64>,

    /// Stop submitting batches once every required field is present. Default: true.
    pub early_exit: bool,

    /// Year written into placeholder records. Default: the current UTC year.
    pub reference_year: i32,

    /// Archive the concatenated raw model replies through the sink. Default: true.
    pub archive_raw_responses: bool,

    /// Receives phase and per-batch progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            retry: RetryPolicy::default(),
            api_timeout_secs: None,
            deadline_secs: None,
            early_exit: true,
            reference_year: Utc::now().year(),
            archive_raw_responses: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("batch_size", &self.batch_size)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("deadline_secs", &self.deadline_secs)
            .field("early_exit", &self.early_exit)
            .field("reference_year", &self.reference_year)
            .field("archive_raw_responses", &self.archive_raw_responses)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Timeout for one call carrying `images` page images.
    pub fn timeout_for(&self, images: usize) -> Duration {
        let secs = match self.api_timeout_secs {
            Some(secs) => secs,
            None => (60 + 6 * images as u64).min(180),
        };
        Duration::from_secs(secs)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn initial_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry.initial_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn deadline_secs(mut self, secs: u64) -> Self {
        self.config.deadline_secs = Some(secs);
        self
    }

    pub fn early_exit(mut self, v: bool) -> Self {
        self.config.early_exit = v;
        self
    }

    pub fn reference_year(mut self, year: i32) -> Self {
        self.config.reference_year = year;
        self
    }

    pub fn archive_raw_responses(mut self, v: bool) -> Self {
        self.config.archive_raw_responses = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, SapsError> {
        let c = &self.config;
        if c.batch_size == 0 || c.batch_size > MAX_BATCH_SIZE {
            return Err(SapsError::InvalidConfig(format!(
                "Batch size must be 1–{MAX_BATCH_SIZE}, got {}",
                c.batch_size
            )));
        }
        if c.model.trim().is_empty() {
            return Err(SapsError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(SapsError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(SapsError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if !(1900..=2200).contains(&c.reference_year) {
            return Err(SapsError::InvalidConfig(format!(
                "Reference year out of range: {}",
                c.reference_year
            )));
        }
        Ok(self.config)
    }
}
