//! Request counters and latency statistics for the prediction service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Upper bounds of the predicted-interactions histogram buckets
const PREDICTION_BUCKETS: [f64; 6] = [10.0, 50.0, 100.0, 500.0, 1000.0, f64::INFINITY];

/// Metrics collector for the service
pub struct ServiceMetrics {
    /// Total requests received
    pub requests_received: AtomicU64,
    /// Requests answered with a prediction
    pub predictions_served: AtomicU64,
    /// Failures by kind
    failures: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Predicted value distribution
    prediction_buckets: RwLock<[u64; PREDICTION_BUCKETS.len()]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_received: AtomicU64::new(0),
            predictions_served: AtomicU64::new(0),
            failures: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            prediction_buckets: RwLock::new([0; PREDICTION_BUCKETS.len()]),
            start_time: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, processing_time: Duration, value: f64) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);

        let bucket = PREDICTION_BUCKETS
            .iter()
            .position(|&upper| value < upper)
            .unwrap_or(PREDICTION_BUCKETS.len() - 1);
        if let Ok(mut buckets) = self.prediction_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a failed request
    pub fn record_failure(&self, processing_time: Duration, kind: &str) {
        self.record_time(processing_time);
        if let Ok(mut failures) = self.failures.write() {
            *failures.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    fn record_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Requests per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_received.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_failures(&self) -> HashMap<String, u64> {
        self.failures
            .read()
            .map(|failures| failures.clone())
            .unwrap_or_default()
    }

    pub fn get_prediction_distribution(&self) -> [u64; PREDICTION_BUCKETS.len()] {
        self.prediction_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let requests = self.requests_received.load(Ordering::Relaxed);
        let served = self.predictions_served.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            requests = requests,
            served = served,
            failed = requests.saturating_sub(served),
            throughput = format!("{:.1} req/s", self.get_throughput()),
            "Service summary"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Processing time"
        );
        for (kind, count) in &self.get_failures() {
            info!(kind = %kind, count = count, "Failures");
        }

        let distribution = self.get_prediction_distribution();
        let total: u64 = distribution.iter().sum();
        let mut lower = 0.0;
        for (&upper, &count) in PREDICTION_BUCKETS.iter().zip(distribution.iter()) {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 5.0) as usize).min(20));
            info!("  {:>6}-{:<6} {:>6} ({:>5.1}%) {}", lower, upper, count, pct, bar);
            lower = upper;
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodically logs a metrics summary
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_request();
        metrics.record_request();
        metrics.record_request();
        metrics.record_prediction(Duration::from_micros(100), 42.0);
        metrics.record_prediction(Duration::from_micros(300), 2500.0);
        metrics.record_failure(Duration::from_micros(50), "unknown_category");

        assert_eq!(metrics.requests_received.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.predictions_served.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.get_failures().get("unknown_category"), Some(&1));
        assert_eq!(metrics.get_prediction_distribution(), [0, 1, 0, 0, 0, 1]);

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.max_us, 300);
        assert_eq!(stats.mean_us, 150);
    }

    #[test]
    fn test_empty_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);
    }
}
