//! Where page images come from.
//!
//! Converting the upload into page images is done elsewhere; the pipeline
//! only asks for the resulting ordered URL list.

use crate::error::SourceError;
use crate::pipeline::input::DocumentRef;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Ordered page-image URLs for `doc`. The list may be empty.
    async fn list_page_images(&self, doc: &DocumentRef) -> Result<Vec<String>, SourceError>;
}

/// An in-memory source: fixed URL lists keyed by document id.
#[derive(Debug, Clone, Default)]
pub struct StaticImageSource {
    documents: HashMap<String, Vec<String>>,
}

impl StaticImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, id: impl Into<String>, urls: Vec<String>) -> Self {
        self.documents.insert(id.into(), urls);
        self
    }
}

#[async_trait]
impl ImageSource for StaticImageSource {
    async fn list_page_images(&self, doc: &DocumentRef) -> Result<Vec<String>, SourceError> {
        self.documents
            .get(&doc.id)
            .cloned()
            .ok_or_else(|| SourceError::DocumentMissing {
                reference: doc.id.clone(),
            })
    }
}
