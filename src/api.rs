//! HTTP surface for Bindery.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /documents` – Upload a document (multipart `file` part plus an
//!   optional `backend` part) and run the full pipeline: store, segment,
//!   stream through the enrichment service, and record in the catalog. The
//!   response returns once the enrichment stream finishes.
//! - `GET /documents` – Upload history for the calling owner, newest first.
//! - `GET /progress` – Server-sent events feed of the owner's live pipeline
//!   progress; one subscription per connection, released on disconnect.
//! - `GET /metrics` – Observe upload and enrichment counters.
//!
//! Owner identity comes from the `X-Owner-Id` header on every route; token
//! verification is an upstream concern.

use crate::config::EnrichmentBackend;
use crate::notify::ProgressEvent;
use crate::pipeline::{IncomingUpload, UploadApi, UploadError};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use serde::Serialize;
use std::{convert::Infallible, sync::Arc};

/// Header carrying the identity of the uploading owner.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Upper bound on multipart upload bodies.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the HTTP router exposing the upload API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: UploadApi + 'static,
{
    Router::new()
        .route(
            "/documents",
            get(list_documents::<S>).post(upload_document::<S>),
        )
        .route("/progress", get(progress_feed::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Success response for the `POST /documents` endpoint.
#[derive(Serialize)]
struct UploadResponse {
    /// Identifier assigned to the uploaded document.
    document_id: String,
    /// Storage folder created for the document's artifacts.
    folder: String,
    /// Relative path of the sealed structured result.
    structured_result_path: String,
    /// Rows in the exported chunk table.
    total_chunks: usize,
    /// Enrichment events recorded during streaming.
    events_received: usize,
    /// Backend that served the enrichment stream.
    backend: EnrichmentBackend,
}

/// Accept an upload and run the pipeline on this request worker.
///
/// The multipart body must contain a `file` part with a filename; a text
/// part named `backend` selects the enrichment endpoint and defaults to the
/// local one. Progress is observable on `GET /progress` while this request
/// is still in flight.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: UploadApi,
{
    let owner_id = require_owner(&headers)?;
    let mut upload: Option<IncomingUpload> = None;
    let mut backend = EnrichmentBackend::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(AppError::InvalidMultipart)?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload.bin".to_string());
                let data = field.bytes().await.map_err(AppError::InvalidMultipart)?;
                upload = Some(IncomingUpload {
                    filename,
                    data: data.to_vec(),
                });
            }
            Some("backend") => {
                let value = field.text().await.map_err(AppError::InvalidMultipart)?;
                backend = parse_backend(&value);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or(AppError::MissingFile)?;
    let outcome = service.process_upload(upload, &owner_id, backend).await?;
    tracing::info!(
        document_id = %outcome.document_id,
        owner_id = %owner_id,
        chunks = outcome.total_chunks,
        events = outcome.events_received,
        "Upload request completed"
    );
    Ok(Json(UploadResponse {
        document_id: outcome.document_id,
        folder: outcome.folder,
        structured_result_path: outcome.structured_result_path,
        total_chunks: outcome.total_chunks,
        events_received: outcome.events_received,
        backend: outcome.backend,
    }))
}

/// Response body for `GET /documents`.
#[derive(Serialize)]
struct UploadsResponse {
    uploads: Vec<crate::catalog::DocumentRecord>,
}

/// List the calling owner's completed uploads, newest first.
async fn list_documents<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
) -> Result<Json<UploadsResponse>, AppError>
where
    S: UploadApi,
{
    let owner_id = require_owner(&headers)?;
    let uploads = service.list_documents(&owner_id);
    Ok(Json(UploadsResponse { uploads }))
}

/// Stream the owner's live progress events as server-sent events.
///
/// Each frame carries the stage name in the SSE `event:` field and the full
/// payload (tagged with `document_id`) as JSON data, so one connection can
/// demultiplex several concurrent uploads.
async fn progress_feed<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
) -> Result<Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>>, AppError>
where
    S: UploadApi,
{
    let owner_id = require_owner(&headers)?;
    let mut subscription = service.subscribe_progress(&owner_id);
    tracing::debug!(owner_id = %owner_id, "Progress feed subscribed");

    let stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            match sse_frame(&event) {
                Ok(frame) => yield Ok(frame),
                Err(error) => {
                    tracing::error!(error = %error, "Failed to serialize progress event");
                }
            }
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_frame(event: &ProgressEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.kind.name()).json_data(event)
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    uploads_completed: u64,
    uploads_failed: u64,
    chunks_exported: u64,
    enrichment_events: u64,
}

/// Return a concise metrics snapshot with upload and enrichment counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Result<Json<MetricsResponse>, AppError>
where
    S: UploadApi,
{
    let snapshot = service.metrics_snapshot();
    Ok(Json(MetricsResponse {
        uploads_completed: snapshot.uploads_completed,
        uploads_failed: snapshot.uploads_failed,
        chunks_exported: snapshot.chunks_exported,
        enrichment_events: snapshot.enrichment_events,
    }))
}

fn require_owner(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(AppError::MissingOwner)
}

fn parse_backend(value: &str) -> EnrichmentBackend {
    value.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(backend = value, "Unknown enrichment backend; using local");
        EnrichmentBackend::Local
    })
}

enum AppError {
    MissingOwner,
    InvalidMultipart(MultipartError),
    MissingFile,
    Upload(UploadError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingOwner | Self::InvalidMultipart(_) | Self::MissingFile => {
                StatusCode::BAD_REQUEST
            }
            Self::Upload(UploadError::UnsupportedFile { .. }) => StatusCode::BAD_REQUEST,
            Self::Upload(UploadError::DocumentParse(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upload(
                UploadError::EnrichmentConnection(_) | UploadError::EnrichmentStream(_),
            ) => StatusCode::BAD_GATEWAY,
            Self::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::MissingOwner => format!("Missing {OWNER_HEADER} header"),
            Self::InvalidMultipart(error) => format!("Invalid multipart body: {error}"),
            Self::MissingFile => "Missing 'file' part".to_string(),
            Self::Upload(error) => error.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(inner: UploadError) -> Self {
        Self::Upload(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, OWNER_HEADER, create_router, parse_backend, sse_frame};
    use crate::catalog::DocumentRecord;
    use crate::config::EnrichmentBackend;
    use crate::enrich::EnrichmentError;
    use crate::metrics::MetricsSnapshot;
    use crate::notify::{ProgressEvent, ProgressEventKind, ProgressHub, ProgressSubscription};
    use crate::pipeline::{IncomingUpload, UploadApi, UploadError, UploadOutcome};
    use crate::segment::DocumentParseError;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use futures_util::StreamExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "bindery-test-boundary";

    #[tokio::test]
    async fn upload_route_runs_the_pipeline() {
        let service = Arc::new(StubUploadService::new(sample_outcome()));
        let app = create_router(service.clone());

        let response = app
            .oneshot(upload_request(
                Some("owner-a"),
                multipart_body(Some("openai"), true),
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["document_id"], "doc-1");
        assert_eq!(json["total_chunks"], 3);
        assert_eq!(json["backend"], "openai");

        let calls = service.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.owner_id, "owner-a");
        assert_eq!(call.filename, "moby dick.pdf");
        assert_eq!(call.backend, EnrichmentBackend::OpenAI);
        assert_eq!(call.data, b"%PDF-1.4 fake");
    }

    #[tokio::test]
    async fn upload_requires_the_owner_header() {
        let service = Arc::new(StubUploadService::new(sample_outcome()));
        let app = create_router(service.clone());

        let response = app
            .oneshot(upload_request(None, multipart_body(None, true)))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn upload_without_a_file_part_is_rejected() {
        let service = Arc::new(StubUploadService::new(sample_outcome()));
        let app = create_router(service.clone());

        let response = app
            .oneshot(upload_request(
                Some("owner-a"),
                multipart_body(Some("local"), false),
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn pipeline_rejection_maps_to_bad_request() {
        let service = Arc::new(StubUploadService::failing());
        let app = create_router(service.clone());

        let response = app
            .oneshot(upload_request(Some("owner-a"), multipart_body(None, true)))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let text = String::from_utf8(body.to_vec()).expect("utf8 body");
        assert!(text.contains("Unsupported file type"));
    }

    #[tokio::test]
    async fn history_route_returns_owner_uploads() {
        let mut service = StubUploadService::new(sample_outcome());
        service.records = vec![sample_record()];
        let service = Arc::new(service);
        let app = create_router(service.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/documents")
                    .header(OWNER_HEADER, "owner-a")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["uploads"][0]["document_id"], "doc-1");
        assert_eq!(json["uploads"][0]["backend"], "local");
    }

    #[tokio::test]
    async fn metrics_route_reports_counters() {
        let service = Arc::new(StubUploadService::new(sample_outcome()));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["uploads_completed"], 7);
        assert_eq!(json["chunks_exported"], 21);
    }

    #[tokio::test]
    async fn progress_feed_streams_published_events() {
        let service = Arc::new(StubUploadService::new(sample_outcome()));
        let app = create_router(service.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/progress")
                    .header(OWNER_HEADER, "owner-a")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            service
                .hub
                .publish(
                    "owner-a",
                    ProgressEvent::new("doc-1", ProgressEventKind::ChunkingStarted),
                )
        );

        let mut frames = response.into_body().into_data_stream();
        let frame = tokio::time::timeout(Duration::from_secs(1), frames.next())
            .await
            .expect("frame within deadline")
            .expect("stream still open")
            .expect("frame bytes");
        let text = String::from_utf8(frame.to_vec()).expect("utf8 frame");
        assert!(text.contains("event: chunking-started"));
        assert!(text.contains("\"document_id\":\"doc-1\""));
    }

    #[test]
    fn sse_frames_carry_the_stage_name() {
        let event = ProgressEvent::new(
            "doc-9",
            ProgressEventKind::Progress {
                processed: 2,
                total: 4,
                percent: 50,
            },
        );
        let frame = sse_frame(&event).expect("serializable event");
        let rendered = format!("{frame:?}");
        assert!(rendered.contains("progress"));
    }

    #[test]
    fn unknown_backend_strings_fall_back_to_local() {
        assert_eq!(parse_backend("openai"), EnrichmentBackend::OpenAI);
        assert_eq!(parse_backend(" LOCAL "), EnrichmentBackend::Local);
        assert_eq!(parse_backend("claude"), EnrichmentBackend::Local);
    }

    #[test]
    fn error_statuses_follow_failure_kind() {
        assert_eq!(AppError::MissingOwner.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::MissingFile.status(), StatusCode::BAD_REQUEST);
        let unsupported = AppError::Upload(UploadError::UnsupportedFile {
            filename: "notes.txt".into(),
        });
        assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);
        let unreadable = AppError::Upload(UploadError::DocumentParse(
            DocumentParseError::EmptyDocument {
                path: "book.pdf".into(),
            },
        ));
        assert_eq!(unreadable.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let refused = AppError::Upload(UploadError::from_enrichment(
            EnrichmentError::UnexpectedStatus {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: String::new(),
            },
        ));
        assert_eq!(refused.status(), StatusCode::BAD_GATEWAY);
    }

    fn sample_outcome() -> UploadOutcome {
        UploadOutcome {
            document_id: "doc-1".to_string(),
            folder: "moby_20240101_010101".to_string(),
            structured_result_path: "moby_20240101_010101/moby_structured.json".to_string(),
            total_chunks: 3,
            events_received: 3,
            backend: EnrichmentBackend::OpenAI,
        }
    }

    fn sample_record() -> DocumentRecord {
        DocumentRecord {
            document_id: "doc-1".to_string(),
            owner_id: "owner-a".to_string(),
            filename: "moby.pdf".to_string(),
            folder: "moby_20240101_010101".to_string(),
            file_path: "moby_20240101_010101/moby.pdf".to_string(),
            preview_path: "moby_20240101_010101/preview.txt".to_string(),
            chunk_table_path: "moby_20240101_010101/moby.csv".to_string(),
            structured_result_path: "moby_20240101_010101/moby_structured.json".to_string(),
            backend: EnrichmentBackend::Local,
            checksum_sha256: "00".repeat(32),
            uploaded_at: "2024-01-01T01:01:01Z".to_string(),
        }
    }

    fn upload_request(owner: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/documents")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(owner) = owner {
            builder = builder.header(OWNER_HEADER, owner);
        }
        builder.body(Body::from(body)).expect("request")
    }

    fn multipart_body(backend: Option<&str>, include_file: bool) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(backend) = backend {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\ncontent-disposition: form-data; \
                     name=\"backend\"\r\n\r\n{backend}\r\n"
                )
                .as_bytes(),
            );
        }
        if include_file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\ncontent-disposition: form-data; name=\"file\"; \
                     filename=\"moby dick.pdf\"\r\ncontent-type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"%PDF-1.4 fake");
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    #[derive(Clone, Debug)]
    struct UploadCall {
        owner_id: String,
        filename: String,
        data: Vec<u8>,
        backend: EnrichmentBackend,
    }

    struct StubUploadService {
        calls: Arc<Mutex<Vec<UploadCall>>>,
        outcome: UploadOutcome,
        fail_unsupported: bool,
        records: Vec<DocumentRecord>,
        hub: ProgressHub,
    }

    impl StubUploadService {
        fn new(outcome: UploadOutcome) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                outcome,
                fail_unsupported: false,
                records: Vec::new(),
                hub: ProgressHub::new(),
            }
        }

        fn failing() -> Self {
            let mut stub = Self::new(sample_outcome());
            stub.fail_unsupported = true;
            stub
        }

        async fn recorded_calls(&self) -> Vec<UploadCall> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl UploadApi for StubUploadService {
        async fn process_upload(
            &self,
            upload: IncomingUpload,
            owner_id: &str,
            backend: EnrichmentBackend,
        ) -> Result<UploadOutcome, UploadError> {
            let mut guard = self.calls.lock().await;
            guard.push(UploadCall {
                owner_id: owner_id.to_string(),
                filename: upload.filename.clone(),
                data: upload.data.clone(),
                backend,
            });
            if self.fail_unsupported {
                return Err(UploadError::UnsupportedFile {
                    filename: upload.filename,
                });
            }
            Ok(self.outcome.clone())
        }

        fn list_documents(&self, _owner_id: &str) -> Vec<DocumentRecord> {
            self.records.clone()
        }

        fn subscribe_progress(&self, owner_id: &str) -> ProgressSubscription {
            self.hub.subscribe(owner_id)
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                uploads_completed: 7,
                uploads_failed: 1,
                chunks_exported: 21,
                enrichment_events: 20,
            }
        }
    }
}
