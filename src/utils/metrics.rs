use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Global metrics collector for the event handler.
///
/// Thread-safe and cheap to clone; shared between the batch processor
/// and the monitoring endpoint.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    events_received: AtomicUsize,
    references_stored: AtomicUsize,
    batches_archived: AtomicUsize,
    batches_skipped: AtomicUsize,
    products_aligned: AtomicUsize,
    products_skipped: AtomicUsize,
    records_failed: AtomicUsize,
    align_latency_ms: RwLock<Vec<u64>>,
    start_time: Instant,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub events_received: usize,
    pub references_stored: usize,
    pub batches_archived: usize,
    pub batches_skipped: usize,
    pub products_aligned: usize,
    pub products_skipped: usize,
    pub records_failed: usize,
    pub avg_align_latency_ms: Option<u64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                events_received: AtomicUsize::new(0),
                references_stored: AtomicUsize::new(0),
                batches_archived: AtomicUsize::new(0),
                batches_skipped: AtomicUsize::new(0),
                products_aligned: AtomicUsize::new(0),
                products_skipped: AtomicUsize::new(0),
                records_failed: AtomicUsize::new(0),
                align_latency_ms: RwLock::new(Vec::new()),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_event(&self) {
        self.inner.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reference_stored(&self) {
        self.inner.references_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_archived(&self, aligned: usize, skipped: usize) {
        self.inner.batches_archived.fetch_add(1, Ordering::Relaxed);
        self.inner.products_aligned.fetch_add(aligned, Ordering::Relaxed);
        self.inner.products_skipped.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn record_batch_skipped(&self) {
        self.inner.batches_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.inner.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_align_latency(&self, millis: u64) {
        self.inner.align_latency_ms.write().push(millis);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latencies = self.inner.align_latency_ms.read();
        let avg = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<u64>() / latencies.len() as u64)
        };
        MetricsSnapshot {
            uptime_secs: self.inner.start_time.elapsed().as_secs(),
            events_received: self.inner.events_received.load(Ordering::Relaxed),
            references_stored: self.inner.references_stored.load(Ordering::Relaxed),
            batches_archived: self.inner.batches_archived.load(Ordering::Relaxed),
            batches_skipped: self.inner.batches_skipped.load(Ordering::Relaxed),
            products_aligned: self.inner.products_aligned.load(Ordering::Relaxed),
            products_skipped: self.inner.products_skipped.load(Ordering::Relaxed),
            records_failed: self.inner.records_failed.load(Ordering::Relaxed),
            avg_align_latency_ms: avg,
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
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_event();
        metrics.record_batch_archived(2, 1);
        metrics.record_batch_archived(3, 0);
        metrics.record_align_latency(10);
        metrics.record_align_latency(30);

        let snap = metrics.snapshot();
        assert_eq!(snap.events_received, 1);
        assert_eq!(snap.batches_archived, 2);
        assert_eq!(snap.products_aligned, 5);
        assert_eq!(snap.products_skipped, 1);
        assert_eq!(snap.avg_align_latency_ms, Some(20));
    }
}
