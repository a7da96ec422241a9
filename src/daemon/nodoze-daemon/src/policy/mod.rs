//! Gating policies
//!
//! Exactly one policy runs per process, chosen from the validated
//! configuration at startup. Each variant owns its directories and timing
//! and loops forever; the engine stops it from outside at a sleep boundary.

use std::path::{Path, PathBuf};

use anyhow::Result;
use nodoze_system::{Action, Actuator, BlockDevices};
use tracing::{error, info, warn};

use crate::config::{GateConfig, PolicyConfig};
use crate::metrics::MetricsCollector;

mod monitor_io;
mod service;
mod time_range;

pub use monitor_io::{MonitorIoGate, MonitorTiming, ScanReport, WatchEntry};
pub use service::ServiceGate;
pub use time_range::TimeRangeGate;

/// Outcome of one gate evaluation for the whole directory set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Idle,
    Active { actuated: usize },
}

pub enum Policy {
    TimeRange(TimeRangeGate),
    MonitorIo(MonitorIoGate<nodoze_system::BlockDeviceCounters>),
    ServiceAvailable(ServiceGate),
}

impl Policy {
    /// Build the configured policy over the already sanitized `dirs`.
    ///
    /// Under `monitor_io` every directory needs a resolvable block device;
    /// the ones without are dropped, and it is an error if none remain.
    pub fn build(config: &GateConfig, dirs: Vec<PathBuf>, devices: &BlockDevices) -> Result<Self> {
        config.check()?;
        let policy = match &config.policy {
            PolicyConfig::TimeRange { range } => {
                Policy::TimeRange(TimeRangeGate::new(dirs, *range, config.interval))
            }
            PolicyConfig::ServiceAvailable { endpoint, timeout } => Policy::ServiceAvailable(
                ServiceGate::new(dirs, endpoint.clone(), *timeout, config.interval),
            ),
            PolicyConfig::MonitorIo {
                scan_frequency,
                keep_awake,
            } => {
                let mut entries = Vec::with_capacity(dirs.len());
                for dir in dirs {
                    match devices.containing(&dir) {
                        Ok(counters) => {
                            info!(
                                "{}: monitoring {} ({})",
                                dir.display(),
                                counters.device(),
                                counters.stat_file().display()
                            );
                            let mut entry = WatchEntry::new(dir, counters);
                            entry.baseline();
                            entries.push(entry);
                        }
                        Err(e) => error!("{}: {}, ignored", dir.display(), e),
                    }
                }
                if entries.is_empty() {
                    anyhow::bail!("no directory resolved to a block device");
                }
                Policy::MonitorIo(MonitorIoGate::new(
                    entries,
                    MonitorTiming {
                        interval: config.interval,
                        scan_frequency: *scan_frequency,
                        keep_awake: *keep_awake,
                    },
                ))
            }
        };
        Ok(policy)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Policy::TimeRange(_) => "time_range",
            Policy::MonitorIo(_) => "monitor_io",
            Policy::ServiceAvailable(_) => "service_available",
        }
    }

    /// Number of directories this policy actuates
    pub fn len(&self) -> usize {
        match self {
            Policy::TimeRange(gate) => gate.dirs().len(),
            Policy::MonitorIo(gate) => gate.entries().len(),
            Policy::ServiceAvailable(gate) => gate.dirs().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the poll loop. Never returns.
    pub async fn run(self, actuator: &mut Actuator, metrics: &MetricsCollector) {
        match self {
            Policy::TimeRange(gate) => gate.run(actuator, metrics).await,
            Policy::MonitorIo(mut gate) => gate.run(actuator, metrics).await,
            Policy::ServiceAvailable(gate) => gate.run(actuator, metrics).await,
        }
    }
}

/// Actuate one directory, logging and counting a failure instead of
/// propagating it. The directory is retried on the next cycle.
pub(crate) fn actuate_one(
    dir: &Path,
    actuator: &mut Actuator,
    metrics: &MetricsCollector,
) -> Option<Action> {
    match actuator.actuate(dir) {
        Ok(action) => {
            metrics.record_action(action);
            Some(action)
        }
        Err(e) => {
            warn!("{}: {}, skipped this cycle", dir.display(), e);
            metrics.record_actuation_error();
            None
        }
    }
}

pub(crate) fn actuate_all(
    dirs: &[PathBuf],
    actuator: &mut Actuator,
    metrics: &MetricsCollector,
) -> Cycle {
    let actuated = dirs
        .iter()
        .filter_map(|dir| actuate_one(dir, actuator, metrics))
        .count();
    Cycle::Active { actuated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodoze_system::MountTable;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_actuate_all_skips_broken_dirs() {
        let good = tempdir().unwrap();
        let gone = good.path().join("gone");
        let dirs = vec![good.path().to_path_buf(), gone];
        let metrics = MetricsCollector::new();
        let mut actuator = Actuator::new();

        let cycle = actuate_all(&dirs, &mut actuator, &metrics);
        assert_eq!(cycle, Cycle::Active { actuated: 1 });
        let stats = metrics.get_stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.actuation_errors, 1);

        // the broken directory is retried, not dropped
        let cycle = actuate_all(&dirs, &mut actuator, &metrics);
        assert_eq!(cycle, Cycle::Active { actuated: 1 });
        assert_eq!(metrics.get_stats().actuation_errors, 2);
    }

    #[test]
    fn test_build_monitor_io_without_devices_fails() {
        let root = tempdir().unwrap();
        let mountinfo = root.path().join("mountinfo");
        std::fs::write(&mountinfo, "").unwrap();
        let devices = BlockDevices::with_roots(MountTable::with_source(mountinfo), root.path());

        let dir = root.path().to_path_buf();
        let config = GateConfig::monitor_io(
            [dir.clone()],
            Duration::from_secs(5),
            Duration::from_secs(1),
            Duration::from_secs(3),
        );
        assert!(Policy::build(&config, vec![dir], &devices).is_err());
    }

    #[test]
    fn test_build_rejects_zero_scan_frequency() {
        let dir = tempdir().unwrap();
        let devices = BlockDevices::with_roots(
            MountTable::with_source(dir.path().join("mountinfo")),
            dir.path(),
        );
        let config = GateConfig::monitor_io(
            [dir.path().to_path_buf()],
            Duration::from_secs(5),
            Duration::ZERO,
            Duration::from_secs(3),
        );
        let err = Policy::build(&config, vec![dir.path().to_path_buf()], &devices)
            .err()
            .expect("zero scan frequency must be rejected");
        assert!(err.to_string().contains("scan_frequency"));
    }

    #[test]
    fn test_build_monitor_io_resolves_dirs() {
        let root = tempdir().unwrap();
        let sys_block = root.path().join("sys/block/sdc");
        std::fs::create_dir_all(&sys_block).unwrap();
        std::fs::write(sys_block.join("stat"), "5 0 0 0 9 0 0 0 0 0 0\n").unwrap();
        let watched = root.path().join("watched");
        std::fs::create_dir_all(&watched).unwrap();
        let mountinfo = root.path().join("mountinfo");
        std::fs::write(
            &mountinfo,
            format!("40 1 8:32 / {} rw - ext4 /dev/sdc rw\n", watched.display()),
        )
        .unwrap();
        let devices = BlockDevices::with_roots(
            MountTable::with_source(mountinfo),
            root.path().join("sys/block"),
        );

        let config = GateConfig::monitor_io(
            [watched.clone()],
            Duration::from_secs(5),
            Duration::from_secs(1),
            Duration::from_secs(3),
        );
        let policy = Policy::build(&config, vec![watched], &devices).unwrap();
        assert_eq!(policy.name(), "monitor_io");
        assert_eq!(policy.len(), 1);
        let Policy::MonitorIo(gate) = policy else {
            panic!("expected monitor_io policy");
        };
        // startup counters are a baseline, not activity
        let entry = &gate.entries()[0];
        assert!(entry.awake_time_remaining().is_zero());
        assert!(entry.time_until_next_tick().is_zero());
    }
}
