use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    files_routed: AtomicU64,
    files_failed: AtomicU64,
    rows_written: AtomicU64,
    retry_count: AtomicU64,
    continuations: AtomicU64,
    merges: AtomicU64,
}

/// In-process counters shared by every worker of one engine instance.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub files_routed: u64,
    pub files_failed: u64,
    pub rows_written: u64,
    pub retry_count: u64,
    pub continuations: u64,
    pub merges: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_routed(&self, count: u64) {
        self.inner.files_routed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failed(&self, count: u64) {
        self.inner.files_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rows(&self, count: u64) {
        self.inner.rows_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_continuations(&self, count: u64) {
        self.inner.continuations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_merges(&self, count: u64) {
        self.inner.merges.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_routed: self.inner.files_routed.load(Ordering::Relaxed),
            files_failed: self.inner.files_failed.load(Ordering::Relaxed),
            rows_written: self.inner.rows_written.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
            continuations: self.inner.continuations.load(Ordering::Relaxed),
            merges: self.inner.merges.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
