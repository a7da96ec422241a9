//! Metrics collection and reporting
//! Follows SRP: Only responsible for metrics collection and export

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics::{counter, gauge};
use nodoze_system::Action;

/// Metrics collector for gate decisions and actuations
pub struct MetricsCollector {
    start_time: Instant,
    ticks: AtomicU64,
    tocks: AtomicU64,
    idle_cycles: AtomicU64,
    io_detected: AtomicU64,
    actuation_errors: AtomicU64,
    counter_errors: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ticks: AtomicU64::new(0),
            tocks: AtomicU64::new(0),
            idle_cycles: AtomicU64::new(0),
            io_detected: AtomicU64::new(0),
            actuation_errors: AtomicU64::new(0),
            counter_errors: AtomicU64::new(0),
        }
    }

    /// Record a successful actuation
    pub fn record_action(&self, action: Action) {
        let label = match action {
            Action::Tick => {
                self.ticks.fetch_add(1, Ordering::Relaxed);
                "tick"
            }
            Action::Tock => {
                self.tocks.fetch_add(1, Ordering::Relaxed);
                "tock"
            }
        };
        counter!("nodoze_actuations_total", "action" => label).increment(1);
    }

    /// Record a cycle where the gate stayed closed
    pub fn record_idle(&self) {
        counter!("nodoze_idle_cycles_total").increment(1);
        self.idle_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_io_detected(&self) {
        counter!("nodoze_io_detected_total").increment(1);
        self.io_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_actuation_error(&self) {
        counter!("nodoze_errors_total", "kind" => "actuation").increment(1);
        self.actuation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_counter_error(&self) {
        counter!("nodoze_errors_total", "kind" => "counters").increment(1);
        self.counter_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of directories that survived sanitation
    pub fn set_watched_directories(&self, count: usize) {
        gauge!("nodoze_watched_directories").set(count as f64);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> MetricsStats {
        MetricsStats {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            ticks: self.ticks.load(Ordering::Relaxed),
            tocks: self.tocks.load(Ordering::Relaxed),
            idle_cycles: self.idle_cycles.load(Ordering::Relaxed),
            io_detected: self.io_detected.load(Ordering::Relaxed),
            actuation_errors: self.actuation_errors.load(Ordering::Relaxed),
            counter_errors: self.counter_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsStats {
    pub uptime_seconds: u64,
    pub ticks: u64,
    pub tocks: u64,
    pub idle_cycles: u64,
    pub io_detected: u64,
    pub actuation_errors: u64,
    pub counter_errors: u64,
}

impl MetricsStats {
    pub fn actuations(&self) -> u64 {
        self.ticks + self.tocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector() {
        let collector = MetricsCollector::new();
        collector.record_action(Action::Tick);
        collector.record_action(Action::Tock);
        collector.record_action(Action::Tick);
        collector.record_idle();
        collector.record_io_detected();
        collector.record_actuation_error();
        collector.record_counter_error();
        collector.record_counter_error();

        let stats = collector.get_stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.tocks, 1);
        assert_eq!(stats.actuations(), 3);
        assert_eq!(stats.idle_cycles, 1);
        assert_eq!(stats.io_detected, 1);
        assert_eq!(stats.actuation_errors, 1);
        assert_eq!(stats.counter_errors, 2);
    }
}
