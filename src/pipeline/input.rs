//! Input validation: reject documents the pipeline cannot handle.
//!
//! This is the only place a fatal error can originate. The check runs before
//! any page listing or model call, so an unsupported upload costs nothing.
//! The file name, the declared MIME type and, when the caller has them, the
//! first bytes of the upload must all agree on one accepted type.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifies one uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Stable identifier used by the image source and the persistence sink.
    pub id: String,
    /// Uploading user; seeds deterministic placeholder data.
    pub user_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub content_type: Option<String>,
    /// Leading bytes of the upload, if available.
    pub magic: Option<Vec<u8>>,
}

impl DocumentRef {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            file_name: file_name.into(),
            file_size,
            content_type: None,
            magic: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_magic(mut self, bytes: &[u8]) -> Self {
        self.magic = Some(bytes.iter().take(8).copied().collect());
        self
    }
}

/// Accepted upload types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
}

impl DocumentKind {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "png" => Some(DocumentKind::Png),
            "jpg" | "jpeg" => Some(DocumentKind::Jpeg),
            _ => None,
        }
    }

    fn mime(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Png => "image/png",
            DocumentKind::Jpeg => "image/jpeg",
        }
    }

    fn matches_magic(self, bytes: &[u8]) -> bool {
        match self {
            DocumentKind::Pdf => bytes.starts_with(b"%PDF"),
            DocumentKind::Png => bytes.starts_with(b"\x89PNG"),
            DocumentKind::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        }
    }
}

/// Validate a document reference before the pipeline starts.
pub fn validate_document(doc: &DocumentRef) -> Result<DocumentKind, InputError> {
    if doc.id.trim().is_empty() || doc.file_name.trim().is_empty() {
        return Err(InputError::MissingDocument {
            reference: if doc.id.is_empty() {
                doc.file_name.clone()
            } else {
                doc.id.clone()
            },
        });
    }

    if doc.file_size == 0 {
        return Err(InputError::EmptyFile {
            file_name: doc.file_name.clone(),
        });
    }

    let ext = doc
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("");
    let kind = DocumentKind::from_extension(ext).ok_or_else(|| InputError::UnsupportedFileType {
        file_name: doc.file_name.clone(),
        detected: if ext.is_empty() {
            "no extension".to_string()
        } else {
            format!(".{ext}")
        },
    })?;

    if let Some(ref ct) = doc.content_type {
        let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let generic = essence.is_empty() || essence == "application/octet-stream";
        if !generic && essence != kind.mime() {
            return Err(InputError::ContentTypeMismatch {
                file_name: doc.file_name.clone(),
                content_type: ct.clone(),
            });
        }
    }

    if let Some(ref magic) = doc.magic {
        if magic.len() >= 4 && !kind.matches_magic(magic) {
            let shown: Vec<String> = magic.iter().take(4).map(|b| format!("{b:02X}")).collect();
            return Err(InputError::UnsupportedFileType {
                file_name: doc.file_name.clone(),
                detected: format!("signature {}", shown.join(" ")),
            });
        }
    }

    debug!("Validated document {} as {:?}", doc.id, kind);
    Ok(kind)
}
