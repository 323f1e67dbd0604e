//! Streaming enrichment client.
//!
//! Posts an exported chunk table to the configured enrichment endpoint and
//! consumes the line-framed JSON events it streams back, assembling them
//! into a JSON-array result file while publishing per-event progress.
//! [`decode`] handles line framing, [`writer`] owns the incremental result
//! file, and [`client`] drives the HTTP exchange.

mod client;
mod decode;
mod types;
mod writer;

pub use client::{EnrichmentClient, EnrichmentJob};
pub use types::{EnrichmentError, StreamPhase, StreamSummary};
