//! Incremental JSON-array assembly.

use std::path::Path;

use serde_json::Value;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Writes enrichment events into a JSON array as they arrive.
///
/// The file holds `[` followed by comma-separated events and becomes valid
/// JSON only when [`seal`](Self::seal) appends the closing `]`. Each append
/// is flushed, so a writer abandoned mid-stream leaves the unterminated
/// array on disk, which marks the result as incomplete.
pub(super) struct StructuredResultWriter {
    file: File,
    events: usize,
}

impl StructuredResultWriter {
    /// Create the result file and write the array opener.
    pub(super) async fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = File::create(path).await?;
        file.write_all(b"[").await?;
        file.flush().await?;
        Ok(Self { file, events: 0 })
    }

    /// Append one event, preceded by a separator after the first.
    pub(super) async fn append(&mut self, event: &Value) -> std::io::Result<()> {
        let mut entry = Vec::new();
        if self.events > 0 {
            entry.extend_from_slice(b",\n");
        }
        entry.extend_from_slice(&serde_json::to_vec(event)?);
        self.file.write_all(&entry).await?;
        self.file.flush().await?;
        self.events += 1;
        Ok(())
    }

    /// Close the array, making the file valid JSON. Returns the event count.
    pub(super) async fn seal(mut self) -> std::io::Result<usize> {
        self.file.write_all(b"]").await?;
        self.file.flush().await?;
        Ok(self.events)
    }

    /// Events appended so far.
    pub(super) fn events(&self) -> usize {
        self.events
    }
}
