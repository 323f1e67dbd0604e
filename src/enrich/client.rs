//! HTTP client for the streaming enrichment exchange.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use serde_json::json;

use crate::config::get_config;
use crate::notify::{ProgressEvent, ProgressEventKind, ProgressHub};

use super::decode::{LineFramer, decode_event_line};
use super::types::{EnrichmentError, StreamPhase, StreamSummary};
use super::writer::StructuredResultWriter;

/// Client that posts chunk batches and consumes enrichment streams.
pub struct EnrichmentClient {
    pub(crate) client: Client,
    pub(crate) api_key: String,
}

/// One streaming exchange: where the batch goes and how progress is keyed.
#[derive(Debug)]
pub struct EnrichmentJob<'a> {
    /// Endpoint URL receiving the batch.
    pub endpoint: &'a str,
    /// Owner whose progress feed receives events.
    pub owner_id: &'a str,
    /// Document the events belong to.
    pub document_id: &'a str,
    /// Raw chunk table text sent as supporting data.
    pub supporting_data: &'a str,
    /// Destination of the structured result array.
    pub result_path: &'a Path,
    /// Expected event count (the exported chunk total).
    pub total_chunks: usize,
}

impl EnrichmentClient {
    /// Construct a client using configuration derived from the environment.
    ///
    /// The connect timeout bounds only connection establishment; a live
    /// stream may pause indefinitely between events.
    pub fn new() -> Result<Self, EnrichmentError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("bindery/0.2")
            .connect_timeout(Duration::from_secs(config.llm_connect_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: config.llm_api_key.clone(),
        })
    }

    /// Post the chunk table and stream the endpoint's events into the
    /// structured result file.
    ///
    /// The result file is created only after the endpoint accepts the batch.
    /// Every parsed event is appended and announced with a `progress` event;
    /// lines that fail to parse are logged and skipped. On a mid-stream
    /// transport error the file is left unsealed and the error is returned.
    pub async fn stream_chunk_batch(
        &self,
        job: EnrichmentJob<'_>,
        hub: &ProgressHub,
    ) -> Result<StreamSummary, EnrichmentError> {
        let mut phase = StreamPhase::Idle;
        advance(&mut phase, StreamPhase::Connecting, job.document_id);

        let response = self
            .client
            .post(job.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "supporting_data": job.supporting_data }))
            .send()
            .await
            .map_err(|source| EnrichmentError::Connect {
                endpoint: job.endpoint.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = EnrichmentError::UnexpectedStatus { status, body };
            tracing::error!(
                endpoint = job.endpoint,
                error = %error,
                "Enrichment endpoint refused the batch"
            );
            return Err(error);
        }

        publish(hub, &job, ProgressEventKind::StreamConnected);
        let mut writer = StructuredResultWriter::create(job.result_path)
            .await
            .map_err(|source| result_write_error(job.result_path, source))?;

        advance(&mut phase, StreamPhase::Streaming, job.document_id);
        let mut body_stream = response.bytes_stream();
        let mut framer = LineFramer::default();
        let mut skipped = 0usize;

        while let Some(next) = body_stream.next().await {
            let bytes = match next {
                Ok(bytes) => bytes,
                Err(source) => {
                    let events = writer.events();
                    tracing::error!(
                        endpoint = job.endpoint,
                        events,
                        error = %source,
                        "Enrichment stream failed mid-flight; result left unsealed"
                    );
                    return Err(EnrichmentError::Stream { events, source });
                }
            };
            for line in framer.push(&bytes) {
                handle_line(&line, &mut writer, &mut skipped, &job, hub).await?;
            }
        }
        if let Some(line) = framer.finish() {
            handle_line(&line, &mut writer, &mut skipped, &job, hub).await?;
        }

        advance(&mut phase, StreamPhase::Sealing, job.document_id);
        let events_received = writer
            .seal()
            .await
            .map_err(|source| result_write_error(job.result_path, source))?;
        let final_percent = percent(events_received, job.total_chunks);
        publish(
            hub,
            &job,
            ProgressEventKind::StreamComplete {
                events: events_received,
            },
        );
        advance(&mut phase, StreamPhase::Done, job.document_id);
        tracing::info!(
            endpoint = job.endpoint,
            events = events_received,
            skipped,
            final_percent,
            "Enrichment stream complete"
        );

        Ok(StreamSummary {
            events_received,
            skipped_lines: skipped,
            final_percent,
        })
    }
}

async fn handle_line(
    line: &str,
    writer: &mut StructuredResultWriter,
    skipped: &mut usize,
    job: &EnrichmentJob<'_>,
    hub: &ProgressHub,
) -> Result<(), EnrichmentError> {
    match decode_event_line(line) {
        None => {}
        Some(Err(error)) => {
            *skipped += 1;
            tracing::debug!(
                line = %truncate_for_log(line),
                error = %error,
                "Skipping undecodable stream line"
            );
        }
        Some(Ok(event)) => {
            writer
                .append(&event)
                .await
                .map_err(|source| result_write_error(job.result_path, source))?;
            let processed = writer.events();
            publish(
                hub,
                job,
                ProgressEventKind::Progress {
                    processed,
                    total: job.total_chunks,
                    percent: percent(processed, job.total_chunks),
                },
            );
        }
    }
    Ok(())
}

fn advance(phase: &mut StreamPhase, next: StreamPhase, document_id: &str) {
    tracing::debug!(document_id, from = ?phase, to = ?next, "Enrichment phase change");
    *phase = next;
}

fn publish(hub: &ProgressHub, job: &EnrichmentJob<'_>, kind: ProgressEventKind) {
    hub.publish(job.owner_id, ProgressEvent::new(job.document_id, kind));
}

fn result_write_error(path: &Path, source: std::io::Error) -> EnrichmentError {
    EnrichmentError::ResultWrite {
        path: path.display().to_string(),
        source,
    }
}

/// Integer floor percentage; exceeds 100 when `processed > total`.
fn percent(processed: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((processed * 100) / total) as u32
    }
}

fn truncate_for_log(line: &str) -> &str {
    const MAX_CHARS: usize = 120;
    match line.char_indices().nth(MAX_CHARS) {
        Some((index, _)) => &line[..index],
        None => line,
    }
}
