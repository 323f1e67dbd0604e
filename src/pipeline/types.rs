//! Core data types and error definitions for the upload pipeline.

use crate::{
    catalog::PersistenceError, config::EnrichmentBackend, enrich::EnrichmentError,
    export::ChunkExportError, segment::DocumentParseError,
};
use thiserror::Error;

/// Errors emitted by the upload pipeline.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The uploaded filename carries an extension outside the allow-list.
    #[error("Unsupported file type '{filename}'")]
    UnsupportedFile {
        /// Original filename as submitted by the client.
        filename: String,
    },
    /// Filesystem failure while laying out the document folder.
    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
    /// The document could not be turned into text.
    #[error("Failed to parse document: {0}")]
    DocumentParse(#[from] DocumentParseError),
    /// The chunk table could not be written or read back.
    #[error("Failed to export chunks: {0}")]
    ChunkExport(#[from] ChunkExportError),
    /// The enrichment endpoint could not be reached or refused the batch.
    #[error("Enrichment connection failed: {0}")]
    EnrichmentConnection(#[source] EnrichmentError),
    /// The enrichment stream died after it was established.
    #[error("Enrichment stream failed: {0}")]
    EnrichmentStream(#[source] EnrichmentError),
    /// The catalog record could not be written.
    #[error("Failed to persist document record: {0}")]
    Persistence(#[from] PersistenceError),
}

impl UploadError {
    /// Sort an enrichment failure into its connection or stream variant.
    pub(crate) fn from_enrichment(error: EnrichmentError) -> Self {
        if error.is_connection() {
            Self::EnrichmentConnection(error)
        } else {
            Self::EnrichmentStream(error)
        }
    }
}

/// Coarse lifecycle position of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    /// Raw file saved into its storage folder.
    Received,
    /// Segmenting text and writing the chunk table.
    Chunking,
    /// Streaming the chunk batch through the enrichment endpoint.
    Streaming,
    /// Writing the catalog record.
    Persisting,
    /// Record written; the upload is durable.
    Complete,
    /// Pipeline aborted; artifacts may remain on disk.
    Failed,
}

/// Mutable bookkeeping for one in-flight upload.
#[derive(Debug, Clone)]
pub struct UploadSession {
    /// Generated document id.
    pub document_id: String,
    /// Owner the progress feed is keyed by.
    pub owner_id: String,
    /// Filename as submitted by the client.
    pub original_filename: String,
    /// Storage folder name, once created.
    pub storage_folder: Option<String>,
    /// Chunk count reported by the exporter, once known.
    pub total_chunks: usize,
    /// Enrichment events processed so far.
    pub processed_chunks: usize,
    /// Current lifecycle phase.
    pub phase: UploadPhase,
}

impl UploadSession {
    /// Open a session for a fresh upload.
    pub fn new(document_id: String, owner_id: &str, original_filename: &str) -> Self {
        Self {
            document_id,
            owner_id: owner_id.to_string(),
            original_filename: original_filename.to_string(),
            storage_folder: None,
            total_chunks: 0,
            processed_chunks: 0,
            phase: UploadPhase::Received,
        }
    }
}

/// Raw upload as received from the HTTP surface.
#[derive(Debug, Clone)]
pub struct IncomingUpload {
    /// Client-supplied filename.
    pub filename: String,
    /// File contents.
    pub data: Vec<u8>,
}

/// Summary of a completed upload produced by
/// [`crate::pipeline::UploadService::process_upload`].
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Generated document id.
    pub document_id: String,
    /// Storage folder name under the upload root.
    pub folder: String,
    /// Relative path of the sealed structured result.
    pub structured_result_path: String,
    /// Rows in the exported chunk table.
    pub total_chunks: usize,
    /// Enrichment events recorded.
    pub events_received: usize,
    /// Backend that served the enrichment stream.
    pub backend: EnrichmentBackend,
}
