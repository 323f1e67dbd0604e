//! Per-owner progress pub/sub.
//!
//! Upload pipelines publish [`ProgressEvent`]s keyed by owner id; HTTP
//! clients subscribe to their own feed and receive the events over SSE. The
//! hub is purely in-process: publishing never blocks, and events sent while
//! an owner has no subscribers are dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::EnrichmentBackend;

/// Buffered events per owner channel before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Lifecycle stages reported while an upload moves through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ProgressEventKind {
    /// Raw file landed in its storage folder.
    UploadReceived {
        /// Stored (sanitized) filename.
        filename: String,
    },
    /// Preview artifact written, or the placeholder chosen.
    PreviewReady {
        /// Relative preview path or placeholder URL.
        preview: String,
    },
    /// Segmentation began.
    ChunkingStarted,
    /// Segmentation finished and the chunk table is on disk.
    ChunkingComplete {
        /// Number of exported chunks.
        total_chunks: usize,
    },
    /// Connecting to the enrichment endpoint.
    StreamConnecting {
        /// Backend the chunk batch is routed to.
        backend: EnrichmentBackend,
    },
    /// Enrichment endpoint accepted the batch and the stream is live.
    StreamConnected,
    /// One enrichment event was appended to the structured result.
    Progress {
        /// Events appended so far.
        processed: usize,
        /// Expected event count (the chunk total).
        total: usize,
        /// Integer floor percentage. May exceed 100 when the endpoint
        /// emits more events than chunks.
        percent: u32,
    },
    /// Stream drained and the structured result was sealed.
    StreamComplete {
        /// Events appended in total.
        events: usize,
    },
    /// Catalog record written; the upload is fully durable.
    PersistenceComplete,
    /// Pipeline aborted; no catalog record was written.
    FatalError {
        /// Human-readable failure description.
        reason: String,
    },
}

impl ProgressEventKind {
    /// Wire name of this stage, also used as the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UploadReceived { .. } => "upload-received",
            Self::PreviewReady { .. } => "preview-ready",
            Self::ChunkingStarted => "chunking-started",
            Self::ChunkingComplete { .. } => "chunking-complete",
            Self::StreamConnecting { .. } => "stream-connecting",
            Self::StreamConnected => "stream-connected",
            Self::Progress { .. } => "progress",
            Self::StreamComplete { .. } => "stream-complete",
            Self::PersistenceComplete => "persistence-complete",
            Self::FatalError { .. } => "fatal-error",
        }
    }
}

/// A progress event tied to one document upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Document the event belongs to.
    pub document_id: String,
    /// Stage payload, flattened into the serialized object.
    #[serde(flatten)]
    pub kind: ProgressEventKind,
}

impl ProgressEvent {
    /// Build an event for the given document.
    pub fn new(document_id: impl Into<String>, kind: ProgressEventKind) -> Self {
        Self {
            document_id: document_id.into(),
            kind,
        }
    }
}

type ChannelMap = Mutex<HashMap<String, broadcast::Sender<ProgressEvent>>>;

/// Registry of per-owner broadcast channels.
///
/// Cloning the hub is cheap; all clones share one registry.
#[derive(Clone, Default)]
pub struct ProgressHub {
    channels: Arc<ChannelMap>,
}

impl ProgressHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the progress feed for `owner_id`.
    ///
    /// The owner's channel is created on first subscription and removed
    /// again when the last subscription is dropped.
    pub fn subscribe(&self, owner_id: &str) -> ProgressSubscription {
        let mut channels = self.channels.lock().expect("progress registry poisoned");
        let sender = channels
            .entry(owner_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        ProgressSubscription {
            owner_id: owner_id.to_string(),
            receiver: sender.subscribe(),
            channels: Arc::clone(&self.channels),
        }
    }

    /// Publish an event to the subscribers of `owner_id`.
    ///
    /// Returns `false` when the owner has no live channel; the event is
    /// dropped in that case.
    pub fn publish(&self, owner_id: &str, event: ProgressEvent) -> bool {
        let channels = self.channels.lock().expect("progress registry poisoned");
        match channels.get(owner_id) {
            Some(sender) => sender.send(event).is_ok(),
            None => {
                tracing::trace!(owner_id, "No subscribers; progress event dropped");
                false
            }
        }
    }

    /// Number of owners currently holding an open channel.
    pub fn active_owners(&self) -> usize {
        self.channels
            .lock()
            .expect("progress registry poisoned")
            .len()
    }
}

/// Live handle on one owner's progress feed.
pub struct ProgressSubscription {
    owner_id: String,
    receiver: broadcast::Receiver<ProgressEvent>,
    channels: Arc<ChannelMap>,
}

impl ProgressSubscription {
    /// Receive the next event, or `None` once the channel closes.
    ///
    /// A subscriber that falls behind the channel buffer loses the lagged
    /// events and resumes at the oldest retained one.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        owner_id = %self.owner_id,
                        skipped,
                        "Progress subscriber lagged"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Owner this subscription listens for.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        let Ok(mut channels) = self.channels.lock() else {
            return;
        };
        // The count still includes this receiver, so 1 means we are last.
        if let Some(sender) = channels.get(&self.owner_id)
            && sender.receiver_count() <= 1
        {
            channels.remove(&self.owner_id);
        }
    }
}
