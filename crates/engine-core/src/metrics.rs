use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    records_read: AtomicU64,
    rows_submitted: AtomicU64,
    records_skipped: AtomicU64,
    rows_uploaded: AtomicU64,
    rows_failed: AtomicU64,
    batches_uploaded: AtomicU64,
    retry_count: AtomicU64,
}

/// Process-wide extraction counters, shared by runners and the upload queue.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_read: u64,
    pub rows_submitted: u64,
    pub records_skipped: u64,
    pub rows_uploaded: u64,
    pub rows_failed: u64,
    pub batches_uploaded: u64,
    pub retry_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_records_read(&self, count: u64) {
        self.inner.records_read.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rows_submitted(&self, count: u64) {
        self.inner.rows_submitted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_records_skipped(&self, count: u64) {
        self.inner
            .records_skipped
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rows_uploaded(&self, count: u64) {
        self.inner.rows_uploaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rows_failed(&self, count: u64) {
        self.inner.rows_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches(&self, count: u64) {
        self.inner
            .batches_uploaded
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_read: self.inner.records_read.load(Ordering::Relaxed),
            rows_submitted: self.inner.rows_submitted.load(Ordering::Relaxed),
            records_skipped: self.inner.records_skipped.load(Ordering::Relaxed),
            rows_uploaded: self.inner.rows_uploaded.load(Ordering::Relaxed),
            rows_failed: self.inner.rows_failed.load(Ordering::Relaxed),
            batches_uploaded: self.inner.batches_uploaded.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = Metrics::new();
        let other = metrics.clone();

        metrics.increment_records_read(3);
        other.increment_rows_submitted(2);
        other.increment_records_skipped(1);
        metrics.increment_rows_uploaded(2);
        metrics.increment_batches(1);

        let snapshot = other.snapshot();
        assert_eq!(snapshot.records_read, 3);
        assert_eq!(snapshot.rows_submitted, 2);
        assert_eq!(snapshot.records_skipped, 1);
        assert_eq!(snapshot.rows_uploaded, 2);
        assert_eq!(snapshot.batches_uploaded, 1);
        assert_eq!(snapshot.rows_failed, 0);
    }
}
