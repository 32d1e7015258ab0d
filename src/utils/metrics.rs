use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Usage metrics for the service.
///
/// Thread-safe and cheap to clone; shared through the application state.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    analyses_total: AtomicUsize,
    analyses_failed: AtomicUsize,
    faces_detected_total: AtomicUsize,
    analysis_latency_ms: RwLock<Vec<u64>>,
    endpoint_counters: DashMap<String, AtomicUsize>,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                analyses_total: AtomicUsize::new(0),
                analyses_failed: AtomicUsize::new(0),
                faces_detected_total: AtomicUsize::new(0),
                analysis_latency_ms: RwLock::new(Vec::new()),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_analysis(&self, success: bool, faces: usize, duration: Duration) {
        self.inner.analyses_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.inner.analyses_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .faces_detected_total
            .fetch_add(faces, Ordering::Relaxed);
        self.inner
            .analysis_latency_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.inner.analysis_latency_ms.read();
        let latency_avg_ms = avg(&latency);
        let latency_p50_ms = percentile(&latency, 0.5);
        let latency_p95_ms = percentile(&latency, 0.95);
        drop(latency);

        let requests = self
            .inner
            .endpoint_counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            analyses_total: self.inner.analyses_total.load(Ordering::Relaxed),
            analyses_failed: self.inner.analyses_failed.load(Ordering::Relaxed),
            faces_detected_total: self.inner.faces_detected_total.load(Ordering::Relaxed),
            latency_avg_ms,
            latency_p50_ms,
            latency_p95_ms,
            requests,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub analyses_total: usize,
    pub analyses_failed: usize,
    pub faces_detected_total: usize,
    pub latency_avg_ms: u64,
    pub latency_p50_ms: u64,
    pub latency_p95_ms: u64,
    pub requests: BTreeMap<String, usize>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_request("/analyze");
        metrics.record_request("/analyze");
        metrics.record_request("/health");
        metrics.record_analysis(true, 2, Duration::from_millis(100));
        metrics.record_analysis(false, 0, Duration::from_millis(50));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.analyses_total, 2);
        assert_eq!(snapshot.analyses_failed, 1);
        assert_eq!(snapshot.faces_detected_total, 2);
        assert_eq!(snapshot.requests.get("/analyze"), Some(&2));
        assert_eq!(snapshot.requests.get("/health"), Some(&1));
        assert_eq!(snapshot.latency_avg_ms, 75);
    }

    #[test]
    fn test_percentile_on_empty_input() {
        assert_eq!(percentile(&[], 0.95), 0);
        assert_eq!(avg(&[]), 0);
    }
}
