//! Error types for the saps-extract library.
//!
//! Failures fall into two groups:
//!
//! * [`SapsError`]: **Fatal**: the document is rejected before the pipeline
//!   starts (unsupported file type, missing document) or the library was
//!   misconfigured. Returned as `Err(SapsError)`.
//!
//! * Everything else is **recoverable** and never escapes
//!   [`crate::extract::ExtractionPipeline::process`]. A failed batch is
//!   recorded as a [`BatchError`] inside its [`crate::output::BatchOutcome`];
//!   an empty or incomplete document degrades to a placeholder-filled record
//!   flagged as synthetic.
//!
//! [`ServiceError`] is the wire-level vocabulary an extraction service speaks;
//! the model client turns it into a [`BatchError`] after applying the retry
//! policy.

use thiserror::Error;

/// All fatal errors returned by the saps-extract library.
#[derive(Debug, Error)]
pub enum SapsError {
    /// The submitted document cannot be processed at all.
    #[error(transparent)]
    Input(#[from] InputError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The extraction service could not be constructed (missing API key etc.).
    #[error("Extraction provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reasons a document is rejected before processing starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// No document reference, or the image source does not know it.
    #[error("Document not found: '{reference}'")]
    MissingDocument { reference: String },

    /// The upload contains no bytes.
    #[error("Document '{file_name}' is empty (0 bytes)")]
    EmptyFile { file_name: String },

    /// The file extension or detected signature is not an accepted type.
    #[error("Unsupported file type for '{file_name}': {detected}. Accepted: PDF, PNG, JPEG")]
    UnsupportedFileType { file_name: String, detected: String },

    /// The declared MIME type contradicts the file name.
    #[error("Content type '{content_type}' does not match file '{file_name}'")]
    ContentTypeMismatch {
        file_name: String,
        content_type: String,
    },
}

/// The document yielded no usable page images.
///
/// Recoverable: the coordinator answers it with a synthesized record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Document has no extractable pages ({rejected} image references rejected)")]
pub struct EmptyDocumentError {
    pub rejected: usize,
}

/// Wire-level failure reported by an extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// HTTP 529: upstream is temporarily overloaded. The only retried class.
    #[error("Extraction service overloaded: {body}")]
    Overloaded { body: String },

    /// Any other non-success status; `body` is the upstream error verbatim.
    #[error("Extraction service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS, decoding or provider-library failure.
    #[error("Extraction service transport error: {detail}")]
    Transport { detail: String },
}

/// A non-fatal error for a single batch.
///
/// The batch contributes nothing to the merged record; processing continues
/// with the next batch.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchError {
    /// Non-retryable status; the upstream body is surfaced verbatim.
    #[error("Batch {batch}: rejected with HTTP {status}: {body}")]
    Rejected { batch: usize, status: u16, body: String },

    /// Still overloaded after every allowed retry.
    #[error("Batch {batch}: service overloaded after {attempts} attempts: {body}")]
    RetriesExhausted {
        batch: usize,
        attempts: u32,
        body: String,
    },

    /// The per-call timeout elapsed. Not retried.
    #[error("Batch {batch}: extraction call timed out after {secs}s")]
    Timeout { batch: usize, secs: u64 },

    /// Network or provider failure. Not retried.
    #[error("Batch {batch}: {detail}")]
    Transport { batch: usize, detail: String },

    /// The call succeeded but the reply held no recognisable JSON record.
    #[error("Batch {batch}: response contained no recognisable extraction JSON")]
    Unparseable { batch: usize },
}

impl BatchError {
    pub fn batch(&self) -> usize {
        match self {
            BatchError::Rejected { batch, .. }
            | BatchError::RetriesExhausted { batch, .. }
            | BatchError::Timeout { batch, .. }
            | BatchError::Transport { batch, .. }
            | BatchError::Unparseable { batch } => *batch,
        }
    }
}

/// Failure of an [`crate::source::ImageSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source has no record of the document. Fatal.
    #[error("Document '{reference}' is unknown to the image source")]
    DocumentMissing { reference: String },

    /// The conversion service could not list pages. Degrades to an empty document.
    #[error("Image source unavailable: {detail}")]
    Unavailable { detail: String },
}

/// Failure of a [`crate::sink::PersistenceSink`]. Logged, never propagated.
#[derive(Debug, Error)]
#[error("Persistence sink error: {0}")]
pub struct SinkError(pub String);

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError(e.to_string())
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError(e.to_string())
    }
}
