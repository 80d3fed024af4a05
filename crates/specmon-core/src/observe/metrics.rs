//! # Monitor Metrics
//!
//! Atomic counters, gauges and histograms for the receive and query paths,
//! exportable as a snapshot or in Prometheus text format.
//!
//! ```rust
//! use specmon_core::observe::MonitorMetrics;
//! use specmon_core::DropCause;
//!
//! let metrics = MonitorMetrics::new();
//! metrics.messages_in.inc();
//! metrics.record_drop(DropCause::PropagationModel);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.drops(DropCause::PropagationModel), 1);
//! ```

use crate::drop_cause::DropCause;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Monotonic atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Atomic gauge.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(&self, v: i64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fixed-bucket histogram. The last bucket counts values above every
/// boundary.
#[derive(Debug)]
pub struct Histogram {
    boundaries: Vec<f64>,
    buckets: Vec<AtomicU64>,
    /// Sum in thousandths
    sum_milli: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(boundaries: Vec<f64>) -> Self {
        let buckets = (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            boundaries,
            buckets,
            sum_milli: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Buckets suited to per-message processing time in microseconds.
    pub fn latency_us() -> Self {
        Self::new(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0, 5000.0])
    }

    pub fn observe(&self, value: f64) {
        let index = self
            .boundaries
            .iter()
            .position(|&b| value < b)
            .unwrap_or(self.boundaries.len());
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
        self.sum_milli
            .fetch_add((value.max(0.0) * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum_milli.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn bucket_counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }
}

/// Everything the monitor PHY and query service count.
#[derive(Debug)]
pub struct MonitorMetrics {
    /// Inbound messages seen
    pub messages_in: Counter,
    /// Messages whose energy was accumulated
    pub messages_accepted: Counter,
    drops: [Counter; DropCause::ALL.len()],
    pub gain_cache_hits: Counter,
    pub gain_cache_misses: Counter,
    /// Transmission times replaced by local time
    pub time_sync_rewrites: Counter,
    pub reports_published: Counter,
    pub publish_errors: Counter,
    pub record_errors: Counter,
    /// Query requests that failed and were skipped
    pub query_errors: Counter,
    /// Frequencies with a noise recorder, across all sub-ids
    pub tracked_frequencies: Gauge,
    pub tracked_sub_ids: Gauge,
    pub process_latency_us: Histogram,
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        Self {
            messages_in: Counter::new(),
            messages_accepted: Counter::new(),
            drops: Default::default(),
            gain_cache_hits: Counter::new(),
            gain_cache_misses: Counter::new(),
            time_sync_rewrites: Counter::new(),
            reports_published: Counter::new(),
            publish_errors: Counter::new(),
            record_errors: Counter::new(),
            query_errors: Counter::new(),
            tracked_frequencies: Gauge::new(),
            tracked_sub_ids: Gauge::new(),
            process_latency_us: Histogram::latency_us(),
        }
    }

    fn drop_slot(cause: DropCause) -> usize {
        DropCause::ALL
            .iter()
            .position(|c| *c == cause)
            .unwrap_or_default()
    }

    pub fn record_drop(&self, cause: DropCause) {
        self.drops[Self::drop_slot(cause)].inc();
    }

    pub fn drops(&self, cause: DropCause) -> u64 {
        self.drops[Self::drop_slot(cause)].get()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_in: self.messages_in.get(),
            messages_accepted: self.messages_accepted.get(),
            drops: DropCause::ALL
                .iter()
                .map(|c| (*c, self.drops(*c)))
                .collect(),
            gain_cache_hits: self.gain_cache_hits.get(),
            gain_cache_misses: self.gain_cache_misses.get(),
            time_sync_rewrites: self.time_sync_rewrites.get(),
            reports_published: self.reports_published.get(),
            publish_errors: self.publish_errors.get(),
            record_errors: self.record_errors.get(),
            query_errors: self.query_errors.get(),
            tracked_frequencies: self.tracked_frequencies.get(),
            tracked_sub_ids: self.tracked_sub_ids.get(),
            process_latency_count: self.process_latency_us.count(),
            process_latency_sum_us: self.process_latency_us.sum(),
        }
    }

    /// Prometheus text exposition.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();

        let mut counter = |name: &str, help: &str, value: u64| {
            out.push_str(&format!("# HELP specmon_{name} {help}\n"));
            out.push_str(&format!("# TYPE specmon_{name} counter\n"));
            out.push_str(&format!("specmon_{name} {value}\n"));
        };
        counter("messages_total", "Inbound messages", s.messages_in);
        counter("messages_accepted_total", "Messages accumulated", s.messages_accepted);
        counter("gain_cache_hits_total", "Gain cache hits", s.gain_cache_hits);
        counter("gain_cache_misses_total", "Gain cache misses", s.gain_cache_misses);
        counter("time_sync_rewrites_total", "Transmission times replaced", s.time_sync_rewrites);
        counter("reports_published_total", "Energy reports published", s.reports_published);
        counter("publish_errors_total", "Energy report publish failures", s.publish_errors);
        counter("record_errors_total", "Energy report record failures", s.record_errors);

        out.push_str("# HELP specmon_drops_total Dropped messages by cause\n");
        out.push_str("# TYPE specmon_drops_total counter\n");
        for (cause, count) in &s.drops {
            out.push_str(&format!(
                "specmon_drops_total{{code=\"{}\",cause=\"{}\"}} {}\n",
                cause.code(),
                cause.label(),
                count
            ));
        }

        out.push_str("# HELP specmon_tracked_frequencies Frequencies with noise history\n");
        out.push_str("# TYPE specmon_tracked_frequencies gauge\n");
        out.push_str(&format!("specmon_tracked_frequencies {}\n", s.tracked_frequencies));

        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub messages_in: u64,
    pub messages_accepted: u64,
    pub drops: Vec<(DropCause, u64)>,
    pub gain_cache_hits: u64,
    pub gain_cache_misses: u64,
    pub time_sync_rewrites: u64,
    pub reports_published: u64,
    pub publish_errors: u64,
    pub record_errors: u64,
    pub query_errors: u64,
    pub tracked_frequencies: i64,
    pub tracked_sub_ids: i64,
    pub process_latency_count: u64,
    pub process_latency_sum_us: f64,
}

impl MetricsSnapshot {
    pub fn drops(&self, cause: DropCause) -> u64 {
        self.drops
            .iter()
            .find(|(c, _)| *c == cause)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    /// Drops other than out-of-band.
    pub fn error_drops(&self) -> u64 {
        self.drops
            .iter()
            .filter(|(c, _)| c.is_error())
            .map(|(_, n)| n)
            .sum()
    }

    pub fn avg_latency_us(&self) -> f64 {
        if self.process_latency_count == 0 {
            0.0
        } else {
            self.process_latency_sum_us / self.process_latency_count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_and_gauge() {
        let counter = Counter::new();
        counter.inc();
        counter.inc_by(9);
        assert_eq!(counter.get(), 10);
        counter.reset();
        assert_eq!(counter.get(), 0);

        let gauge = Gauge::new();
        gauge.set(4);
        gauge.add(-1);
        assert_eq!(gauge.get(), 3);
    }

    #[test]
    fn test_histogram() {
        let hist = Histogram::new(vec![10.0, 100.0]);
        hist.observe(5.0);
        hist.observe(50.0);
        hist.observe(500.0);
        assert_eq!(hist.count(), 3);
        assert!((hist.sum() - 555.0).abs() < 0.01);
        assert_eq!(hist.bucket_counts(), vec![1, 1, 1]);
    }

    #[test]
    fn test_drop_counters() {
        let metrics = MonitorMetrics::new();
        metrics.record_drop(DropCause::OutOfBand);
        metrics.record_drop(DropCause::SpectrumClamp);
        metrics.record_drop(DropCause::SpectrumClamp);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.drops(DropCause::SpectrumClamp), 2);
        assert_eq!(snapshot.drops(DropCause::NotFoi), 0);
        assert_eq!(snapshot.error_drops(), 2);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = MonitorMetrics::new();
        metrics.messages_in.inc_by(3);
        metrics.record_drop(DropCause::NotFoi);

        let out = metrics.to_prometheus();
        assert!(out.contains("specmon_messages_total 3"));
        assert!(out.contains("specmon_drops_total{code=\"7\",cause=\"Not FOI\"} 1"));
    }
}
