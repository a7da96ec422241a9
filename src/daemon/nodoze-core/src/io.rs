//! Cumulative block I/O counters and the delta rule applied to them

use std::path::Path;

/// A (reads, writes) pair of cumulative or delta counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IoCounters {
    pub reads: u64,
    pub writes: u64,
}

impl IoCounters {
    /// Zero delta. Numerically identical to a real (0, 0) reading; callers
    /// compare against the stored snapshot rather than relying on identity.
    pub const NO_IO: IoCounters = IoCounters {
        reads: 0,
        writes: 0,
    };

    pub const fn new(reads: u64, writes: u64) -> Self {
        Self { reads, writes }
    }

    /// True when either field moved
    pub fn is_active(&self) -> bool {
        *self != Self::NO_IO
    }
}

/// Result of advancing a single cumulative counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterStep {
    /// Fresh value equals the snapshot; snapshot untouched
    Unchanged,
    /// Counter grew by the given amount; snapshot rebased
    Advanced(u64),
    /// Counter went backwards (device reset or re-enumeration); snapshot
    /// rebased to `current` and reported as zero delta
    Regressed { previous: u64, current: u64 },
}

impl CounterStep {
    pub fn delta(self) -> u64 {
        match self {
            CounterStep::Advanced(delta) => delta,
            CounterStep::Unchanged | CounterStep::Regressed { .. } => 0,
        }
    }

    /// Apply the delta rule to one counter, updating `snapshot` in place.
    pub fn advance(snapshot: &mut u64, fresh: u64) -> Self {
        let previous = *snapshot;
        if fresh == previous {
            return CounterStep::Unchanged;
        }
        *snapshot = fresh;
        if fresh < previous {
            CounterStep::Regressed {
                previous,
                current: fresh,
            }
        } else {
            CounterStep::Advanced(fresh - previous)
        }
    }
}

/// Per-field outcome of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoDelta {
    pub reads: CounterStep,
    pub writes: CounterStep,
}

impl IoDelta {
    pub fn counters(&self) -> IoCounters {
        IoCounters::new(self.reads.delta(), self.writes.delta())
    }

    pub fn regressed(&self) -> bool {
        matches!(self.reads, CounterStep::Regressed { .. })
            || matches!(self.writes, CounterStep::Regressed { .. })
    }
}

/// Last-observed cumulative counters.
///
/// Each field is tracked independently, so "reads moved but writes didn't"
/// is reported as exactly that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoSnapshot {
    last: IoCounters,
}

impl IoSnapshot {
    /// Start from an explicit baseline. `IoSnapshot::default()` starts at
    /// (0, 0), so the first observation reports the full cumulative count.
    pub fn new(baseline: IoCounters) -> Self {
        Self { last: baseline }
    }

    pub fn last(&self) -> IoCounters {
        self.last
    }

    pub fn observe(&mut self, fresh: IoCounters) -> IoDelta {
        IoDelta {
            reads: self.observe_reads(fresh.reads),
            writes: self.observe_writes(fresh.writes),
        }
    }

    pub fn observe_reads(&mut self, fresh: u64) -> CounterStep {
        CounterStep::advance(&mut self.last.reads, fresh)
    }

    pub fn observe_writes(&mut self, fresh: u64) -> CounterStep {
        CounterStep::advance(&mut self.last.writes, fresh)
    }
}

/// A source of I/O deltas, one call per observation.
///
/// The error type keeps "could not read the counters" distinct from a real
/// zero delta.
pub trait IoSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn take_io(&mut self) -> Result<IoCounters, Self::Error>;

    /// Where the counters come from. Sources reporting the same path watch
    /// the same device and see each other's writes. `None` shares with nothing.
    fn counters_path(&self) -> Option<&Path> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_from_zero_baseline() {
        let mut snapshot = IoSnapshot::default();
        let deltas: Vec<u64> = [10u64, 10, 15, 15, 30]
            .into_iter()
            .map(|raw| snapshot.observe(IoCounters::new(raw, 0)).counters().reads)
            .collect();
        assert_eq!(deltas, vec![10, 0, 5, 0, 15]);
        assert_eq!(snapshot.last(), IoCounters::new(30, 0));
    }

    #[test]
    fn test_fields_are_independent() {
        let mut snapshot = IoSnapshot::new(IoCounters::new(100, 200));

        let delta = snapshot.observe(IoCounters::new(100, 250));
        assert_eq!(delta.reads, CounterStep::Unchanged);
        assert_eq!(delta.writes, CounterStep::Advanced(50));
        assert_eq!(delta.counters(), IoCounters::new(0, 50));
        assert!(delta.counters().is_active());

        let delta = snapshot.observe(IoCounters::new(100, 250));
        assert_eq!(delta.counters(), IoCounters::NO_IO);
        assert!(!delta.counters().is_active());
    }

    #[test]
    fn test_regression_rebaselines() {
        let mut snapshot = IoSnapshot::default();
        assert_eq!(snapshot.observe(IoCounters::new(50, 7)).counters().reads, 50);

        let delta = snapshot.observe(IoCounters::new(20, 7));
        assert_eq!(
            delta.reads,
            CounterStep::Regressed {
                previous: 50,
                current: 20
            }
        );
        assert!(delta.regressed());
        assert_eq!(delta.counters(), IoCounters::NO_IO);
        assert_eq!(snapshot.last(), IoCounters::new(20, 7));

        // growth resumes from the new baseline
        assert_eq!(snapshot.observe(IoCounters::new(23, 7)).counters().reads, 3);
    }
}
