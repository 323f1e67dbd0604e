//! Line framing and event decoding for the enrichment stream.
//!
//! Transport chunks arrive with no alignment guarantees: one JSON event may
//! span several chunks and one chunk may carry several events. The framer
//! buffers bytes until a full line is available. Event lines may carry an
//! SSE-style `data:` prefix, which is stripped before JSON parsing.

use serde_json::Value;

/// Accumulates transport bytes and yields complete lines.
#[derive(Default)]
pub(super) struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    /// Feed bytes in; get back every line completed by this chunk.
    pub(super) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Drain whatever is left once the transport closes.
    pub(super) fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Decode one framed line.
///
/// Returns `None` for blank lines, `Some(Err)` for lines that are not JSON,
/// and `Some(Ok)` for parsed events.
pub(super) fn decode_event_line(line: &str) -> Option<Result<Value, serde_json::Error>> {
    let payload = line.strip_prefix("data:").unwrap_or(line).trim();
    if payload.is_empty() {
        return None;
    }
    Some(serde_json::from_str(payload))
}
