//! Document catalog.
//!
//! Completed uploads are recorded as one `record.json` per storage folder.
//! Listing scans the upload root rather than a database: each owner sees
//! only their own records, newest first. Unreadable record files are
//! skipped with a warning so one corrupt folder cannot break the history
//! endpoint.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::EnrichmentBackend;

/// File name of the per-folder catalog record.
pub const RECORD_FILE_NAME: &str = "record.json";

/// Errors raised while persisting a catalog record.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The record could not be written to disk.
    #[error("Failed to write catalog record '{path}': {source}")]
    Io {
        /// Path of the record file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The record could not be serialized.
    #[error("Failed to serialize catalog record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable description of one completed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique id assigned when the upload started.
    pub document_id: String,
    /// Owner the upload belongs to.
    pub owner_id: String,
    /// Stored filename inside the document folder.
    pub filename: String,
    /// Folder name under the upload root.
    pub folder: String,
    /// Relative path of the raw document.
    pub file_path: String,
    /// Relative preview path or placeholder URL.
    pub preview_path: String,
    /// Relative path of the chunk table.
    pub chunk_table_path: String,
    /// Relative path of the structured result array.
    pub structured_result_path: String,
    /// Backend that enriched the document.
    pub backend: EnrichmentBackend,
    /// Hex SHA-256 of the uploaded bytes.
    pub checksum_sha256: String,
    /// RFC 3339 upload time.
    pub uploaded_at: String,
}

/// Filesystem-backed document history.
#[derive(Clone, Debug)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    /// Create a catalog over the given upload root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write `record` into its folder as `record.json`.
    pub async fn write_record(&self, record: &DocumentRecord) -> Result<(), PersistenceError> {
        let path = self.root.join(&record.folder).join(RECORD_FILE_NAME);
        let body = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| PersistenceError::Io {
                path: path.display().to_string(),
                source,
            })
    }

    /// List the records belonging to `owner_id`, newest first.
    pub fn list_for_owner(&self, owner_id: &str) -> Vec<DocumentRecord> {
        let mut records = Vec::new();
        let entries = WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    tracing::warn!(error = %error, "Skipping unreadable catalog entry");
                    None
                }
            });
        for entry in entries {
            if entry.file_name().to_str() != Some(RECORD_FILE_NAME) {
                continue;
            }
            match read_record(entry.path()) {
                Ok(record) if record.owner_id == owner_id => records.push(record),
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(
                        path = %entry.path().display(),
                        error = %error,
                        "Skipping malformed catalog record"
                    );
                }
            }
        }
        // RFC 3339 strings sort chronologically.
        records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        records
    }
}

fn read_record(path: &Path) -> anyhow::Result<DocumentRecord> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Hex SHA-256 digest of the uploaded bytes.
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Fresh document id.
pub(crate) fn generate_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current timestamp formatted for record storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
