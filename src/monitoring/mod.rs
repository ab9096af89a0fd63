//! Monitoring Module
//!
//! Latency, throughput and error counters for the serving paths.

mod metrics;

pub use metrics::{HistogramBucket, MetricsSummary, ServingMetrics};
