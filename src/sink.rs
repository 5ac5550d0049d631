//! Persistence of per-batch logs, raw replies and the terminal record.
//!
//! Sink failures never abort a document. The coordinator logs them at
//! `warn!` and counts them in [`crate::output::ExtractionStats`].

use crate::error::{BatchError, SinkError};
use crate::output::{BatchOutcome, ExtractionStats};
use crate::record::ExtractionFieldSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// One row of the per-batch audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchLog {
    pub document_id: String,
    pub batch_index: usize,
    pub total_batches: usize,
    pub image_count: usize,
    pub parsed: Option<ExtractionFieldSet>,
    pub raw_text: String,
    pub error: Option<BatchError>,
    pub recorded_at: DateTime<Utc>,
}

impl BatchLog {
    pub fn from_outcome(document_id: &str, outcome: &BatchOutcome) -> Self {
        Self {
            document_id: document_id.to_string(),
            batch_index: outcome.batch_index,
            total_batches: outcome.total_batches,
            image_count: outcome.image_count,
            parsed: outcome.parsed.clone(),
            raw_text: outcome.raw_text.clone(),
            error: outcome.error.clone(),
            recorded_at: Utc::now(),
        }
    }
}

/// The terminal record as persisted for the underwriting flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalRecord {
    pub document_id: String,
    pub record: ExtractionFieldSet,
    pub response_artifact_url: Option<String>,
    pub stats: ExtractionStats,
    pub completed_at: DateTime<Utc>,
}

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn record_batch(&self, log: &BatchLog) -> Result<(), SinkError>;

    /// Store the concatenated raw replies; returns a URL if the sink has one.
    async fn archive_response(
        &self,
        document_id: &str,
        raw: &str,
    ) -> Result<Option<String>, SinkError> {
        let _ = (document_id, raw);
        Ok(None)
    }

    async fn record_final(&self, record: &FinalRecord) -> Result<(), SinkError>;
}

/// Discards everything.
pub struct NoopSink;

#[async_trait]
impl PersistenceSink for NoopSink {
    async fn record_batch(&self, _log: &BatchLog) -> Result<(), SinkError> {
        Ok(())
    }

    async fn record_final(&self, _record: &FinalRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps everything in memory; handy for tests and embedding.
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<BatchLog>>,
    archives: Mutex<Vec<(String, String)>>,
    finals: Mutex<Vec<FinalRecord>>,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<BatchLog> {
        guard(&self.batches).clone()
    }

    /// `(document_id, raw text)` pairs in archive order.
    pub fn archives(&self) -> Vec<(String, String)> {
        guard(&self.archives).clone()
    }

    pub fn finals(&self) -> Vec<FinalRecord> {
        guard(&self.finals).clone()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn record_batch(&self, log: &BatchLog) -> Result<(), SinkError> {
        guard(&self.batches).push(log.clone());
        Ok(())
    }

    async fn archive_response(
        &self,
        document_id: &str,
        raw: &str,
    ) -> Result<Option<String>, SinkError> {
        let mut archives = guard(&self.archives);
        archives.push((document_id.to_string(), raw.to_string()));
        Ok(Some(format!("memory://{}/{}", document_id, archives.len())))
    }

    async fn record_final(&self, record: &FinalRecord) -> Result<(), SinkError> {
        guard(&self.finals).push(record.clone());
        Ok(())
    }
}

/// Writes JSON files under `root/<document id>/`.
///
/// Layout: `batch-001.json` per batch, `responses.txt` for the raw archive,
/// `record.json` for the terminal record. Every file is written to a
/// temporary name and renamed into place.
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_dir(&self, document_id: &str) -> PathBuf {
        self.root.join(sanitize(document_id))
    }
}

#[async_trait]
impl PersistenceSink for DirectorySink {
    async fn record_batch(&self, log: &BatchLog) -> Result<(), SinkError> {
        let path = self
            .document_dir(&log.document_id)
            .join(format!("batch-{:03}.json", log.batch_index));
        write_atomic(&path, &serde_json::to_vec_pretty(log)?).await
    }

    async fn archive_response(
        &self,
        document_id: &str,
        raw: &str,
    ) -> Result<Option<String>, SinkError> {
        let path = self.document_dir(document_id).join("responses.txt");
        write_atomic(&path, raw.as_bytes()).await?;
        let absolute = tokio::fs::canonicalize(&path).await?;
        let url = Url::from_file_path(&absolute)
            .map_err(|_| SinkError(format!("no file URL for {}", absolute.display())))?;
        Ok(Some(url.to_string()))
    }

    async fn record_final(&self, record: &FinalRecord) -> Result<(), SinkError> {
        let path = self.document_dir(&record.document_id).join("record.json");
        write_atomic(&path, &serde_json::to_vec_pretty(record)?).await
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Directory-safe form of a document id.
fn sanitize(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
