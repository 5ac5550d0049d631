//! Image set preparation: filter page-image URLs and partition them into batches.
//!
//! The conversion service hands us an ordered list of page-image URLs. Before
//! anything is sent upstream, references the extraction service could not
//! fetch (malformed or non-HTTP URLs) or could not decode (unsupported
//! formats) are dropped and counted. The survivors are cut into consecutive
//! chunks of at most `batch_size` images, preserving page order.

use crate::error::EmptyDocumentError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A page image reference with its position in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// 1-indexed page number among the valid images.
    pub page: usize,
    pub url: String,
    pub media_type: String,
}

/// Result of filtering the raw image list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredImages {
    pub valid: Vec<ImageRef>,
    pub invalid: Vec<String>,
    pub unsupported: Vec<String>,
}

impl FilteredImages {
    pub fn rejected(&self) -> usize {
        self.invalid.len() + self.unsupported.len()
    }
}

/// One submission unit: 1..=N consecutive page images.
///
/// Immutable once built; the constructor is private to this module so the
/// size bound cannot be bypassed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBatchJob {
    batch_index: usize,
    total_batches: usize,
    images: Vec<ImageRef>,
}

impl DocumentBatchJob {
    /// 1-indexed batch number.
    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn total_batches(&self) -> usize {
        self.total_batches
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Page number of the first image in this batch.
    pub fn first_page(&self) -> usize {
        self.images.first().map(|i| i.page).unwrap_or(0)
    }
}

/// Split the raw URL list into valid, invalid and unsupported references.
pub fn filter_images(urls: impl IntoIterator<Item = String>) -> FilteredImages {
    let mut out = FilteredImages::default();
    for raw in urls {
        let trimmed = raw.trim();
        let parsed = match Url::parse(trimmed) {
            Ok(u) if matches!(u.scheme(), "http" | "https" | "file") => u,
            _ => {
                out.invalid.push(raw);
                continue;
            }
        };
        let ext = parsed
            .path()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match media_type_for(&ext) {
            Some(media_type) => {
                let page = out.valid.len() + 1;
                out.valid.push(ImageRef {
                    page,
                    url: trimmed.to_string(),
                    media_type: media_type.to_string(),
                });
            }
            None => out.unsupported.push(raw),
        }
    }

    info!(
        "Page images: {} valid, {} invalid, {} unsupported",
        out.valid.len(),
        out.invalid.len(),
        out.unsupported.len()
    );
    out
}

/// Formats the extraction service accepts, keyed by lowercase extension.
fn media_type_for(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Partition valid images into batches of at most `batch_size`.
///
/// Produces `ceil(P / N)` batches whose concatenation is exactly the input.
pub fn prepare_batches(
    images: Vec<ImageRef>,
    batch_size: usize,
    rejected: usize,
) -> Result<Vec<DocumentBatchJob>, EmptyDocumentError> {
    if images.is_empty() {
        return Err(EmptyDocumentError { rejected });
    }
    let size = batch_size.max(1);
    let total_batches = images.len().div_ceil(size);

    let jobs: Vec<DocumentBatchJob> = images
        .chunks(size)
        .enumerate()
        .map(|(i, chunk)| DocumentBatchJob {
            batch_index: i + 1,
            total_batches,
            images: chunk.to_vec(),
        })
        .collect();

    debug!(
        "Prepared {} batches of up to {} images ({} pages)",
        jobs.len(),
        size,
        images.len()
    );
    Ok(jobs)
}
