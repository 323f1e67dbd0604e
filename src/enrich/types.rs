use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while posting a chunk batch or consuming its stream.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The HTTP client itself could not be constructed.
    #[error("Failed to build enrichment HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    /// The endpoint could not be reached.
    #[error("Failed to connect to enrichment endpoint '{endpoint}': {source}")]
    Connect {
        /// Endpoint URL the batch was posted to.
        endpoint: String,
        /// Transport error from the attempt.
        #[source]
        source: reqwest::Error,
    },
    /// The endpoint answered with a non-success status before streaming.
    #[error("Enrichment endpoint returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code returned by the endpoint.
        status: StatusCode,
        /// Raw response body to aid debugging.
        body: String,
    },
    /// The transport failed while the event stream was in flight.
    #[error("Enrichment stream aborted after {events} events: {source}")]
    Stream {
        /// Events appended before the failure.
        events: usize,
        /// Transport error that ended the stream.
        #[source]
        source: reqwest::Error,
    },
    /// The structured result file could not be created or appended.
    #[error("Failed to write structured result '{path}': {source}")]
    ResultWrite {
        /// Path of the result file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl EnrichmentError {
    /// True when the failure happened before any event streamed.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Client(_) | Self::Connect { .. } | Self::UnexpectedStatus { .. }
        )
    }
}

/// Phases of the streaming exchange, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Nothing in flight yet.
    Idle,
    /// Batch posted; waiting for the endpoint to accept it.
    Connecting,
    /// Events are being consumed and appended.
    Streaming,
    /// Stream drained; closing the result array.
    Sealing,
    /// Result sealed and valid.
    Done,
}

/// Outcome of a successful streaming exchange.
#[derive(Debug, Clone, Copy)]
pub struct StreamSummary {
    /// Events appended to the structured result.
    pub events_received: usize,
    /// Lines that failed to parse and were skipped.
    pub skipped_lines: usize,
    /// Final progress percentage reported.
    pub final_percent: u32,
}
