//! Serving metrics
//!
//! Rolling latency window, latency histogram and throughput samples for one
//! kind of request. Counters are atomics; the collections share a single
//! lock so `record_latency` takes it once.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Histogram upper bounds, in milliseconds
const BUCKET_BOUNDS: [f64; 10] = [1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, f64::INFINITY];

const THROUGHPUT_SAMPLES: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Upper bound of this bucket (in milliseconds)
    pub le: f64,
    pub count: u64,
}

struct MetricsInner {
    latencies: VecDeque<f64>,
    histogram: Vec<HistogramBucket>,
    throughput_samples: VecDeque<(Instant, u64)>,
}

/// Latency and throughput collector for one request type
pub struct ServingMetrics {
    window_size: usize,
    inner: RwLock<MetricsInner>,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    total_items: AtomicU64,
    start_time: Instant,
}

impl Default for ServingMetrics {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl ServingMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            inner: RwLock::new(MetricsInner {
                latencies: VecDeque::with_capacity(window_size),
                histogram: BUCKET_BOUNDS.iter().map(|&le| HistogramBucket { le, count: 0 }).collect(),
                throughput_samples: VecDeque::with_capacity(THROUGHPUT_SAMPLES),
            }),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_items: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one completed request that handled `items` instances
    pub fn record(&self, latency_ms: f64, items: u64) {
        {
            let mut inner = self.inner.write();
            inner.latencies.push_back(latency_ms);
            if inner.latencies.len() > self.window_size {
                inner.latencies.pop_front();
            }
            if let Some(bucket) = inner.histogram.iter_mut().find(|b| latency_ms <= b.le) {
                bucket.count += 1;
            }
            inner.throughput_samples.push_back((Instant::now(), items));
            while inner.throughput_samples.len() > THROUGHPUT_SAMPLES {
                inner.throughput_samples.pop_front();
            }
        }
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_items.fetch_add(items, Ordering::Relaxed);
    }

    /// Record a failed request; it still counts towards the total
    pub fn record_error(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency(&self) -> f64 {
        let inner = self.inner.read();
        if inner.latencies.is_empty() {
            0.0
        } else {
            inner.latencies.iter().sum::<f64>() / inner.latencies.len() as f64
        }
    }

    pub fn max_latency(&self) -> f64 {
        self.inner.read().latencies.iter().copied().fold(0.0, f64::max)
    }

    /// Latency at `percentile` (0-100) over the rolling window
    pub fn percentile_latency(&self, percentile: f64) -> f64 {
        let mut data: Vec<f64> = self.inner.read().latencies.iter().copied().collect();
        if data.is_empty() {
            return 0.0;
        }
        let idx = (((percentile / 100.0) * (data.len() - 1) as f64) as usize).min(data.len() - 1);
        data.select_nth_unstable_by(idx, |a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        data[idx]
    }

    /// Items per second across the retained samples
    pub fn throughput(&self) -> f64 {
        let inner = self.inner.read();
        let (Some(first), Some(last)) = (inner.throughput_samples.front(), inner.throughput_samples.back()) else {
            return 0.0;
        };
        let duration = last.0.duration_since(first.0).as_secs_f64();
        if inner.throughput_samples.len() < 2 || duration <= 0.0 {
            return 0.0;
        }
        inner.throughput_samples.iter().map(|(_, c)| c).sum::<u64>() as f64 / duration
    }

    pub fn error_rate(&self) -> f64 {
        let requests = self.total_requests.load(Ordering::Relaxed);
        if requests == 0 {
            0.0
        } else {
            self.total_errors.load(Ordering::Relaxed) as f64 / requests as f64
        }
    }

    pub fn histogram(&self) -> Vec<HistogramBucket> {
        self.inner.read().histogram.clone()
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_requests: self.total_requests(),
            total_errors: self.total_errors(),
            total_items: self.total_items.load(Ordering::Relaxed),
            error_rate: self.error_rate(),
            avg_latency_ms: self.avg_latency(),
            max_latency_ms: self.max_latency(),
            p50_latency_ms: self.percentile_latency(50.0),
            p95_latency_ms: self.percentile_latency(95.0),
            p99_latency_ms: self.percentile_latency(99.0),
            throughput_per_sec: self.throughput(),
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }

    pub fn reset(&self) {
        {
            let mut inner = self.inner.write();
            inner.latencies.clear();
            inner.histogram.iter_mut().for_each(|b| b.count = 0);
            inner.throughput_samples.clear();
        }
        self.total_requests.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
        self.total_items.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of a [`ServingMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_items: u64,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub throughput_per_sec: f64,
    pub uptime_secs: f64,
}
