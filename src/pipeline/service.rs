//! Upload service coordinating storage, segmentation, enrichment, and the
//! catalog.

use crate::{
    catalog::{self, Catalog, DocumentRecord},
    config::{EnrichmentBackend, get_config},
    enrich::{EnrichmentClient, EnrichmentJob},
    export,
    metrics::{MetricsSnapshot, UploadMetrics},
    notify::{ProgressEvent, ProgressEventKind, ProgressHub, ProgressSubscription},
    pipeline::types::{IncomingUpload, UploadError, UploadOutcome, UploadPhase, UploadSession},
    segment::{self, SegmenterOptions},
    storage::{self, DocumentStorage},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Coordinates the full upload pipeline: folder layout, segmentation, the
/// enrichment stream, and the final catalog record.
///
/// The service owns long-lived handles to the storage root, catalog,
/// enrichment transport, progress hub, and metrics registry so that the HTTP
/// surface and the companion tooling reuse the same components. Construct the
/// service once near process start and share it through an `Arc`.
pub struct UploadService {
    storage: DocumentStorage,
    catalog: Catalog,
    enrichment: EnrichmentClient,
    hub: ProgressHub,
    metrics: Arc<UploadMetrics>,
}

/// Abstraction over the upload pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait UploadApi: Send + Sync {
    /// Run the whole pipeline for one uploaded file.
    async fn process_upload(
        &self,
        upload: IncomingUpload,
        owner_id: &str,
        backend: EnrichmentBackend,
    ) -> Result<UploadOutcome, UploadError>;

    /// Catalog records belonging to `owner_id`, newest first.
    fn list_documents(&self, owner_id: &str) -> Vec<DocumentRecord>;

    /// Open a live progress feed for `owner_id`.
    fn subscribe_progress(&self, owner_id: &str) -> ProgressSubscription;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl UploadService {
    /// Build a new upload service, creating the upload root if needed.
    pub async fn new() -> Self {
        let config = get_config();
        let storage = DocumentStorage::new(&config.upload_root);
        storage
            .ensure_root()
            .await
            .expect("Failed to create upload root");
        tracing::debug!(root = %config.upload_root, "Upload root ready");
        let enrichment = EnrichmentClient::new().expect("Failed to build enrichment client");

        Self {
            catalog: Catalog::new(&config.upload_root),
            storage,
            enrichment,
            hub: ProgressHub::new(),
            metrics: Arc::new(UploadMetrics::new()),
        }
    }

    /// Validate, store, segment, stream, and record one uploaded document.
    ///
    /// Progress events are published to the owner's feed at every stage. On
    /// failure the owner receives a terminal `fatal-error` event, the failure
    /// counter ticks, and partial artifacts stay on disk for manual
    /// inspection.
    pub async fn process_upload(
        &self,
        upload: IncomingUpload,
        owner_id: &str,
        backend: EnrichmentBackend,
    ) -> Result<UploadOutcome, UploadError> {
        let mut session =
            UploadSession::new(catalog::generate_document_id(), owner_id, &upload.filename);
        tracing::info!(
            document_id = %session.document_id,
            owner_id,
            filename = %session.original_filename,
            backend = ?backend,
            "Processing upload"
        );

        match self.run_pipeline(&mut session, &upload, backend).await {
            Ok(outcome) => {
                self.metrics
                    .record_completion(outcome.total_chunks as u64, outcome.events_received as u64);
                Ok(outcome)
            }
            Err(error) => {
                let failed_during = session.phase;
                session.phase = UploadPhase::Failed;
                self.metrics.record_failure();
                self.publish(
                    &session,
                    ProgressEventKind::FatalError {
                        reason: error.to_string(),
                    },
                );
                if let Some(folder) = &session.storage_folder {
                    tracing::warn!(
                        document_id = %session.document_id,
                        folder = %folder,
                        "Partial artifacts left in place after failed upload"
                    );
                }
                tracing::error!(
                    document_id = %session.document_id,
                    owner_id = %session.owner_id,
                    filename = %session.original_filename,
                    phase = ?failed_during,
                    chunks = session.total_chunks,
                    processed = session.processed_chunks,
                    error = %error,
                    "Upload failed"
                );
                Err(error)
            }
        }
    }

    async fn run_pipeline(
        &self,
        session: &mut UploadSession,
        upload: &IncomingUpload,
        backend: EnrichmentBackend,
    ) -> Result<UploadOutcome, UploadError> {
        if !storage::extension_allowed(&session.original_filename) {
            return Err(UploadError::UnsupportedFile {
                filename: session.original_filename.clone(),
            });
        }

        let base = storage::normalize_base_name(&session.original_filename);
        let stored_name = storage::sanitize_file_name(&session.original_filename);
        let (folder_name, folder_path) = self.storage.create_document_folder(&base).await?;
        session.storage_folder = Some(folder_name.clone());
        let document_path = self
            .storage
            .save_raw_file(&folder_path, &stored_name, &upload.data)
            .await?;
        self.publish(
            session,
            ProgressEventKind::UploadReceived {
                filename: stored_name.clone(),
            },
        );

        let preview = self
            .storage
            .write_preview(&folder_name, &folder_path, &document_path)
            .await;
        self.publish(
            session,
            ProgressEventKind::PreviewReady {
                preview: preview.clone(),
            },
        );

        session.phase = UploadPhase::Chunking;
        self.publish(session, ProgressEventKind::ChunkingStarted);
        let options = SegmenterOptions::from_config(get_config());
        let chunks =
            segment::segment_document(&document_path, &folder_name, &stored_name, &options)?;
        let table_path = folder_path.join(format!("{base}.csv"));
        let total_chunks = export::write_chunk_table(&table_path, &chunks).await?;
        session.total_chunks = total_chunks;
        self.publish(session, ProgressEventKind::ChunkingComplete { total_chunks });

        session.phase = UploadPhase::Streaming;
        self.publish(session, ProgressEventKind::StreamConnecting { backend });
        let supporting_data = export::read_table_text(&table_path).await?;
        let result_name = format!("{base}_structured.json");
        let result_path = folder_path.join(&result_name);
        let job = EnrichmentJob {
            endpoint: get_config().endpoint_for(backend),
            owner_id: &session.owner_id,
            document_id: &session.document_id,
            supporting_data: &supporting_data,
            result_path: &result_path,
            total_chunks,
        };
        let summary = self
            .enrichment
            .stream_chunk_batch(job, &self.hub)
            .await
            .map_err(UploadError::from_enrichment)?;
        session.processed_chunks = summary.events_received;

        session.phase = UploadPhase::Persisting;
        let record = DocumentRecord {
            document_id: session.document_id.clone(),
            owner_id: session.owner_id.clone(),
            filename: stored_name.clone(),
            folder: folder_name.clone(),
            file_path: format!("{folder_name}/{stored_name}"),
            preview_path: preview,
            chunk_table_path: format!("{folder_name}/{base}.csv"),
            structured_result_path: format!("{folder_name}/{result_name}"),
            backend,
            checksum_sha256: catalog::compute_checksum(&upload.data),
            uploaded_at: catalog::current_timestamp_rfc3339(),
        };
        self.catalog.write_record(&record).await?;
        self.publish(session, ProgressEventKind::PersistenceComplete);
        session.phase = UploadPhase::Complete;

        tracing::info!(
            document_id = %session.document_id,
            folder = %folder_name,
            chunks = total_chunks,
            events = summary.events_received,
            skipped = summary.skipped_lines,
            "Upload complete"
        );

        Ok(UploadOutcome {
            document_id: session.document_id.clone(),
            folder: folder_name,
            structured_result_path: record.structured_result_path,
            total_chunks,
            events_received: summary.events_received,
            backend,
        })
    }

    fn publish(&self, session: &UploadSession, kind: ProgressEventKind) {
        self.hub.publish(
            &session.owner_id,
            ProgressEvent::new(session.document_id.clone(), kind),
        );
    }

    /// Catalog records belonging to `owner_id`, newest first.
    pub fn list_documents(&self, owner_id: &str) -> Vec<DocumentRecord> {
        self.catalog.list_for_owner(owner_id)
    }

    /// Open a live progress feed for `owner_id`.
    pub fn subscribe_progress(&self, owner_id: &str) -> ProgressSubscription {
        self.hub.subscribe(owner_id)
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl UploadApi for UploadService {
    async fn process_upload(
        &self,
        upload: IncomingUpload,
        owner_id: &str,
        backend: EnrichmentBackend,
    ) -> Result<UploadOutcome, UploadError> {
        UploadService::process_upload(self, upload, owner_id, backend).await
    }

    fn list_documents(&self, owner_id: &str) -> Vec<DocumentRecord> {
        UploadService::list_documents(self, owner_id)
    }

    fn subscribe_progress(&self, owner_id: &str) -> ProgressSubscription {
        UploadService::subscribe_progress(self, owner_id)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        UploadService::metrics_snapshot(self)
    }
}
