//! Keep directories awake for a while after their block device saw I/O
//!
//! Every directory runs its own small state machine, advanced once per scan:
//!
//! 1. take the I/O delta of the device;
//! 2. decay the keep-awake window by one scan period (not below zero);
//! 3. if a tick is scheduled, decay its countdown; when it runs out,
//!    flush the counters, actuate, then discard the delta caused by our own
//!    write. The countdown is rearmed only while the window is still open;
//! 4. on detected I/O, reopen the window and schedule a tick if none is
//!    pending.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nodoze_core::IoSource;
use nodoze_system::{Action, Actuator};
use tracing::{debug, info, warn};

use super::actuate_one;
use crate::metrics::MetricsCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorTiming {
    pub interval: Duration,
    pub scan_frequency: Duration,
    pub keep_awake: Duration,
}

/// What a single scan observed and did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub io_detected: bool,
    pub action: Option<Action>,
}

/// Per-directory monitoring state
pub struct WatchEntry<S> {
    dir: PathBuf,
    source: S,
    awake_time_remaining: Duration,
    time_until_next_tick: Duration,
}

impl<S: IoSource> WatchEntry<S> {
    pub fn new(dir: PathBuf, source: S) -> Self {
        Self {
            dir,
            source,
            awake_time_remaining: Duration::ZERO,
            time_until_next_tick: Duration::ZERO,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn awake_time_remaining(&self) -> Duration {
        self.awake_time_remaining
    }

    pub fn time_until_next_tick(&self) -> Duration {
        self.time_until_next_tick
    }

    /// Absorb the counters accumulated before monitoring started
    pub fn baseline(&mut self) {
        if let Err(e) = self.source.take_io() {
            warn!("{}: failed to take initial I/O counters: {}", self.dir.display(), e);
        }
    }

    pub fn scan(
        &mut self,
        timing: &MonitorTiming,
        actuator: &mut Actuator,
        metrics: &MetricsCollector,
    ) -> ScanReport {
        let mut report = ScanReport {
            io_detected: self.detect_io(metrics),
            action: None,
        };

        self.awake_time_remaining = self
            .awake_time_remaining
            .saturating_sub(timing.scan_frequency);

        if !self.time_until_next_tick.is_zero() {
            self.time_until_next_tick = self
                .time_until_next_tick
                .saturating_sub(timing.scan_frequency);
            if self.time_until_next_tick.is_zero() {
                let pending = self.detect_io(metrics);
                report.io_detected |= pending;
                report.action = actuate_one(&self.dir, actuator, metrics);
                // our own write is not outside activity
                self.discard_io();
                if !self.awake_time_remaining.is_zero() {
                    self.time_until_next_tick = timing.interval;
                }
            }
        }

        if report.io_detected {
            info!("{}: I/O detected", self.dir.display());
            metrics.record_io_detected();
            self.awake_time_remaining = timing.keep_awake;
            if self.time_until_next_tick.is_zero() {
                self.time_until_next_tick = timing.interval;
            }
        }

        debug!(
            "{}: awake {:?}, next tick in {:?}",
            self.dir.display(),
            self.awake_time_remaining,
            self.time_until_next_tick
        );
        report
    }

    /// Unreadable counters count as "nothing detected" for this scan only
    fn detect_io(&mut self, metrics: &MetricsCollector) -> bool {
        match self.source.take_io() {
            Ok(delta) => delta.is_active(),
            Err(e) => {
                warn!("{}: {}, skipped this scan", self.dir.display(), e);
                metrics.record_counter_error();
                false
            }
        }
    }

    fn discard_io(&mut self) {
        if let Err(e) = self.source.take_io() {
            warn!("{}: failed to flush I/O counters: {}", self.dir.display(), e);
        }
    }
}

/// Scans every watched directory once per `scan_frequency`.
///
/// Directories whose counters come from the same device are peers: after
/// one of them is actuated, every peer's counters are flushed as well.
pub struct MonitorIoGate<S> {
    entries: Vec<WatchEntry<S>>,
    peers: Vec<Vec<usize>>,
    timing: MonitorTiming,
}

impl<S: IoSource> MonitorIoGate<S> {
    pub fn new(entries: Vec<WatchEntry<S>>, timing: MonitorTiming) -> Self {
        let peers = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let Some(path) = entry.source.counters_path() else {
                    return Vec::new();
                };
                entries
                    .iter()
                    .enumerate()
                    .filter(|(j, other)| {
                        *j != i && other.source.counters_path() == Some(path)
                    })
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect::<Vec<Vec<usize>>>();
        for (entry, peers) in entries.iter().zip(&peers) {
            if !peers.is_empty() {
                debug!(
                    "{}: shares its device with {} other director{}",
                    entry.dir.display(),
                    peers.len(),
                    if peers.len() == 1 { "y" } else { "ies" }
                );
            }
        }
        Self {
            entries,
            peers,
            timing,
        }
    }

    pub fn entries(&self) -> &[WatchEntry<S>] {
        &self.entries
    }

    pub fn timing(&self) -> &MonitorTiming {
        &self.timing
    }

    pub fn scan_all(
        &mut self,
        actuator: &mut Actuator,
        metrics: &MetricsCollector,
    ) -> Vec<ScanReport> {
        let timing = self.timing;
        let mut reports = Vec::with_capacity(self.entries.len());
        for i in 0..self.entries.len() {
            let report = self.entries[i].scan(&timing, actuator, metrics);
            if report.action.is_some() {
                // our write is visible on every directory of that device
                for &peer in &self.peers[i] {
                    self.entries[peer].discard_io();
                }
            }
            reports.push(report);
        }
        reports
    }

    pub async fn run(&mut self, actuator: &mut Actuator, metrics: &MetricsCollector) {
        loop {
            self.scan_all(actuator, metrics);
            tokio::time::sleep(self.timing.scan_frequency).await;
        }
    }
}
