use std::path::PathBuf;
use std::time::Duration;

use nodoze_core::{TimeOfDay, TimeRange};
use nodoze_system::Actuator;
use tracing::info;

use super::{actuate_all, Cycle};
use crate::metrics::MetricsCollector;

/// Actuate every directory while the local time is inside a window
pub struct TimeRangeGate {
    dirs: Vec<PathBuf>,
    range: TimeRange,
    interval: Duration,
}

impl TimeRangeGate {
    pub fn new(dirs: Vec<PathBuf>, range: TimeRange, interval: Duration) -> Self {
        Self {
            dirs,
            range,
            interval,
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn cycle(&self, now: TimeOfDay, actuator: &mut Actuator, metrics: &MetricsCollector) -> Cycle {
        if !now.contains(&self.range) {
            info!("{} outside {}, idle", now, self.range);
            metrics.record_idle();
            return Cycle::Idle;
        }
        actuate_all(&self.dirs, actuator, metrics)
    }

    pub async fn run(&self, actuator: &mut Actuator, metrics: &MetricsCollector) {
        loop {
            self.cycle(TimeOfDay::now(), actuator, metrics);
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodoze_system::{SENTINEL_FILE_NAME, RANDOM_BYTE_COUNT};
    use tempfile::tempdir;

    fn t(h: u8, m: u8, s: u8) -> TimeOfDay {
        TimeOfDay::new(h, m, s).unwrap()
    }

    #[test]
    fn test_night_window() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let gate = TimeRangeGate::new(
            vec![a.path().to_path_buf(), b.path().to_path_buf()],
            TimeRange::new(t(22, 0, 0), t(6, 0, 0)),
            Duration::from_secs(30),
        );
        let metrics = MetricsCollector::new();
        let mut actuator = Actuator::new();

        assert_eq!(gate.cycle(t(12, 0, 0), &mut actuator, &metrics), Cycle::Idle);
        assert!(!a.path().join(SENTINEL_FILE_NAME).exists());

        assert_eq!(
            gate.cycle(t(23, 0, 0), &mut actuator, &metrics),
            Cycle::Active { actuated: 2 }
        );
        for dir in [&a, &b] {
            let len = std::fs::metadata(dir.path().join(SENTINEL_FILE_NAME))
                .unwrap()
                .len();
            assert_eq!(len, RANDOM_BYTE_COUNT as u64);
        }

        assert_eq!(
            gate.cycle(t(2, 0, 0), &mut actuator, &metrics),
            Cycle::Active { actuated: 2 }
        );
        let stats = metrics.get_stats();
        assert_eq!((stats.ticks, stats.tocks, stats.idle_cycles), (2, 2, 1));
    }

    #[test]
    fn test_unrestricted_range_always_acts() {
        let a = tempdir().unwrap();
        let gate = TimeRangeGate::new(
            vec![a.path().to_path_buf()],
            TimeRange::ALWAYS,
            Duration::from_secs(30),
        );
        let metrics = MetricsCollector::new();
        let mut actuator = Actuator::new();
        for now in [t(0, 0, 0), t(12, 0, 0), t(23, 59, 59)] {
            assert_eq!(
                gate.cycle(now, &mut actuator, &metrics),
                Cycle::Active { actuated: 1 }
            );
        }
    }
}
