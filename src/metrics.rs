//! Self-accounting for the aircraft poller
//!
//! Uses atomic counters so the poller can record activity through a shared
//! reference. Values are only ever logged, never sent to statsd.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters describing what the poller has done since it started
#[derive(Debug)]
pub struct PollerMetrics {
    pub cycles: AtomicU64,
    pub rates_computed: AtomicU64,
    pub restarts_detected: AtomicU64,
    pub messages_counted: AtomicU64,
    pub aircraft_reported: AtomicU64,
    pub metrics_emitted: AtomicU64,
    pub emit_failures: AtomicU64,
    started: Instant,
}

impl PollerMetrics {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            rates_computed: AtomicU64::new(0),
            restarts_detected: AtomicU64::new(0),
            messages_counted: AtomicU64::new(0),
            aircraft_reported: AtomicU64::new(0),
            metrics_emitted: AtomicU64::new(0),
            emit_failures: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    /// Get a snapshot of all current values
    pub fn snapshot(&self) -> PollerMetricsSnapshot {
        PollerMetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            rates_computed: self.rates_computed.load(Ordering::Relaxed),
            restarts_detected: self.restarts_detected.load(Ordering::Relaxed),
            messages_counted: self.messages_counted.load(Ordering::Relaxed),
            aircraft_reported: self.aircraft_reported.load(Ordering::Relaxed),
            metrics_emitted: self.metrics_emitted.load(Ordering::Relaxed),
            emit_failures: self.emit_failures.load(Ordering::Relaxed),
            uptime: self.started.elapsed(),
        }
    }
}

impl Default for PollerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Poller counters at a point in time
#[derive(Debug, Clone)]
pub struct PollerMetricsSnapshot {
    pub cycles: u64,
    pub rates_computed: u64,
    pub restarts_detected: u64,
    pub messages_counted: u64,
    pub aircraft_reported: u64,
    pub metrics_emitted: u64,
    pub emit_failures: u64,
    pub uptime: Duration,
}

impl PollerMetricsSnapshot {
    /// Average decoder message rate over all computed intervals
    pub fn messages_per_cycle(&self) -> f64 {
        if self.rates_computed == 0 {
            0.0
        } else {
            self.messages_counted as f64 / self.rates_computed as f64
        }
    }

    /// Format a compact summary string for logging
    pub fn format_summary(&self) -> String {
        format!(
            "{} cycles ({} with rate, {} decoder restarts), {} messages counted ({:.0}/cycle), {} aircraft reported, {} metrics sent, {} send failures over {:.0}s",
            self.cycles,
            self.rates_computed,
            self.restarts_detected,
            self.messages_counted,
            self.messages_per_cycle(),
            self.aircraft_reported,
            self.metrics_emitted,
            self.emit_failures,
            self.uptime.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let m = PollerMetrics::new();
        assert_eq!(m.cycles.load(Ordering::Relaxed), 0);

        PollerMetrics::add(&m.cycles, 1);
        assert_eq!(m.snapshot().cycles, 1);
    }

    #[test]
    fn test_messages_per_cycle() {
        let m = PollerMetrics::new();
        PollerMetrics::add(&m.rates_computed, 4);
        PollerMetrics::add(&m.messages_counted, 1000);

        assert!((m.snapshot().messages_per_cycle() - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_summary() {
        let snap = PollerMetricsSnapshot {
            cycles: 12,
            rates_computed: 10,
            restarts_detected: 1,
            messages_counted: 15200,
            aircraft_reported: 84,
            metrics_emitted: 94,
            emit_failures: 0,
            uptime: Duration::from_secs(120),
        };

        let summary = snap.format_summary();
        assert!(summary.contains("12 cycles"));
        assert!(summary.contains("1 decoder restarts"));
        assert!(summary.contains("(1520/cycle)"));
        assert!(summary.contains("84 aircraft reported"));
    }
}
