use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing upload activity.
#[derive(Default)]
pub struct UploadMetrics {
    uploads_completed: AtomicU64,
    uploads_failed: AtomicU64,
    chunks_exported: AtomicU64,
    enrichment_events: AtomicU64,
}

impl UploadMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed upload along with its chunk and event totals.
    pub fn record_completion(&self, chunk_count: u64, event_count: u64) {
        self.uploads_completed.fetch_add(1, Ordering::Relaxed);
        self.chunks_exported.fetch_add(chunk_count, Ordering::Relaxed);
        self.enrichment_events
            .fetch_add(event_count, Ordering::Relaxed);
    }

    /// Record an upload that failed before producing a catalog record.
    pub fn record_failure(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads_completed: self.uploads_completed.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            chunks_exported: self.chunks_exported.load(Ordering::Relaxed),
            enrichment_events: self.enrichment_events.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of upload counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of uploads that ran to completion since startup.
    pub uploads_completed: u64,
    /// Number of uploads that failed at any pipeline stage.
    pub uploads_failed: u64,
    /// Total chunk count written across all completed uploads.
    pub chunks_exported: u64,
    /// Total enrichment events received across all completed uploads.
    pub enrichment_events: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_completions_and_failures() {
        let metrics = UploadMetrics::new();
        metrics.record_completion(12, 12);
        metrics.record_completion(3, 4);
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploads_completed, 2);
        assert_eq!(snapshot.uploads_failed, 1);
        assert_eq!(snapshot.chunks_exported, 15);
        assert_eq!(snapshot.enrichment_events, 16);
    }

    #[test]
    fn snapshot_starts_at_zero() {
        let metrics = UploadMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploads_completed, 0);
        assert_eq!(snapshot.uploads_failed, 0);
        assert_eq!(snapshot.chunks_exported, 0);
        assert_eq!(snapshot.enrichment_events, 0);
    }
}
