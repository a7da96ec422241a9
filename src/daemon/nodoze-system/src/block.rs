//! Block device resolution and I/O delta tracking
//!
//! Maps a mount point, a `/dev` path or a bare device name to the
//! `/sys/block` statistics file of the disk (or partition) behind it, and
//! turns the cumulative counters in that file into per-call deltas.

use std::fs;
use std::path::{Path, PathBuf};

use nodoze_core::{CounterStep, IoCounters, IoSnapshot, IoSource};
use tracing::{debug, warn};

use crate::error::{CountersError, ResolveError};
use crate::mounts::MountTable;

pub const SYS_BLOCK_PATH: &str = "/sys/block";
pub const BLOCK_STAT_NAME: &str = "stat";

/// Sector unit used by the kernel block statistics
/// (Documentation/block/stat.rst), for callers converting counts to bytes
pub const SECTOR_SIZE: u64 = 512;

// Field positions in a block stat line
const READS_FIELD: usize = 0;
const WRITES_FIELD: usize = 4;

/// Factory for [`BlockDeviceCounters`], owning the mount table cache
#[derive(Debug)]
pub struct BlockDevices {
    mounts: MountTable,
    sys_block: PathBuf,
}

impl BlockDevices {
    pub fn new() -> Self {
        Self::with_roots(MountTable::new(), SYS_BLOCK_PATH)
    }

    /// Resolve against a different mount table and `/sys/block` root
    pub fn with_roots(mounts: MountTable, sys_block: impl Into<PathBuf>) -> Self {
        Self {
            mounts,
            sys_block: sys_block.into(),
        }
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    /// Force the mount table to be re-read before the next lookup
    pub fn refresh(&self) -> Result<(), ResolveError> {
        self.mounts.refresh().map(|_| ())
    }

    /// e.g. `/mnt/usb_disk`. The path must be a mount point itself.
    pub fn from_mount_path(&self, mount_path: &Path) -> Result<BlockDeviceCounters, ResolveError> {
        if !mount_path.is_dir() {
            return Err(ResolveError::NotADirectory(mount_path.to_path_buf()));
        }
        let mounts = self.mounts.snapshot()?;
        let source = mounts
            .get(mount_path)
            .ok_or_else(|| ResolveError::NotMounted(mount_path.to_path_buf()))?;
        self.open(source)
    }

    /// Counters for the filesystem containing `dir`, which does not need to
    /// be a mount point. The deepest enclosing mount point wins.
    pub fn containing(&self, dir: &Path) -> Result<BlockDeviceCounters, ResolveError> {
        if !dir.is_dir() {
            return Err(ResolveError::NotADirectory(dir.to_path_buf()));
        }
        let dir = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let mounts = self.mounts.snapshot()?;
        let source = dir
            .ancestors()
            .find_map(|ancestor| mounts.get(ancestor))
            .ok_or_else(|| ResolveError::NotMounted(dir.clone()))?;
        self.open(source)
    }

    /// e.g. `/dev/sda1`
    pub fn from_block_path(&self, block_path: &Path) -> Result<BlockDeviceCounters, ResolveError> {
        let mounts = self.mounts.snapshot()?;
        let source = mounts
            .values()
            .find(|source| source.as_path() == block_path)
            .ok_or_else(|| ResolveError::UnknownDevice(block_path.display().to_string()))?;
        self.open(source)
    }

    /// e.g. `sda1`
    pub fn from_block_name(&self, block_name: &str) -> Result<BlockDeviceCounters, ResolveError> {
        let mounts = self.mounts.snapshot()?;
        let source = mounts
            .values()
            .find(|source| source.file_name().is_some_and(|name| name == block_name))
            .ok_or_else(|| ResolveError::UnknownDevice(block_name.to_string()))?;
        self.open(source)
    }

    /// Dispatch on the shape of `target`: `/dev/...` is a block path, any
    /// other path is a directory on some mount, anything else a device name.
    pub fn resolve(&self, target: &str) -> Result<BlockDeviceCounters, ResolveError> {
        let path = Path::new(target);
        if path.starts_with("/dev") {
            self.from_block_path(path)
        } else if target.contains('/') {
            self.containing(path)
        } else {
            self.from_block_name(target)
        }
    }

    /// Locate the stat file for a mount source.
    ///
    /// A name found directly under `/sys/block` is a whole disk. Otherwise
    /// trailing characters are dropped until a disk matches (`sda1` -> `sda`);
    /// the partition's own stat file is preferred over the disk's.
    pub fn find_block_stat(&self, device: &Path) -> Result<PathBuf, ResolveError> {
        let device_name = device_name(device);

        let disk_path = self.sys_block.join(&device_name);
        if disk_path.is_dir() {
            let stat = disk_path.join(BLOCK_STAT_NAME);
            if stat.is_file() {
                return Ok(stat);
            }
            return Err(ResolveError::NoCountersFile {
                device: device_name,
                disk: disk_path,
            });
        }

        let disk_path = device_name
            .char_indices()
            .rev()
            .map(|(end, _)| &device_name[..end])
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| self.sys_block.join(prefix))
            .find(|candidate| candidate.is_dir())
            .ok_or_else(|| ResolveError::NoBlockDevice(device_name.clone()))?;

        let partition_stat = disk_path.join(&device_name).join(BLOCK_STAT_NAME);
        if partition_stat.is_file() {
            return Ok(partition_stat);
        }
        let disk_stat = disk_path.join(BLOCK_STAT_NAME);
        if disk_stat.is_file() {
            return Ok(disk_stat);
        }
        Err(ResolveError::NoCountersFile {
            device: device_name,
            disk: disk_path,
        })
    }

    fn open(&self, source: &Path) -> Result<BlockDeviceCounters, ResolveError> {
        let stat_file = self.find_block_stat(source)?;
        debug!(
            "Resolved {} to counters {}",
            source.display(),
            stat_file.display()
        );
        Ok(BlockDeviceCounters::from_stat_file(
            device_name(source),
            stat_file,
        ))
    }
}

impl Default for BlockDevices {
    fn default() -> Self {
        Self::new()
    }
}

/// Kernel name of a mount source. Symlinked sources such as
/// `/dev/mapper/root` or `/dev/disk/by-uuid/...` resolve to their target
/// (`dm-0`, `sda2`) when the link exists.
fn device_name(source: &Path) -> String {
    let resolved = if source.is_absolute() {
        fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf())
    } else {
        source.to_path_buf()
    };
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string_lossy().into_owned())
}

/// Cumulative I/O counters of one block device plus the last snapshot taken
/// from them.
///
/// The snapshot starts at (0, 0): the first [`take_io`](Self::take_io) after
/// construction reports the full cumulative count.
#[derive(Debug)]
pub struct BlockDeviceCounters {
    device: String,
    stat_file: PathBuf,
    snapshot: IoSnapshot,
}

impl BlockDeviceCounters {
    pub fn from_stat_file(device: impl Into<String>, stat_file: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            stat_file: stat_file.into(),
            snapshot: IoSnapshot::default(),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn stat_file(&self) -> &Path {
        &self.stat_file
    }

    pub fn last_observed(&self) -> IoCounters {
        self.snapshot.last()
    }

    /// Raw cumulative counters, without touching the snapshot
    pub fn read_totals(&self) -> Result<IoCounters, CountersError> {
        let contents =
            fs::read_to_string(&self.stat_file).map_err(|source| CountersError::Read {
                path: self.stat_file.clone(),
                source,
            })?;
        parse_stat(&contents).ok_or_else(|| CountersError::Malformed {
            path: self.stat_file.clone(),
            line: contents.trim().to_string(),
        })
    }

    pub fn total_reads(&self) -> Result<u64, CountersError> {
        self.read_totals().map(|totals| totals.reads)
    }

    pub fn total_writes(&self) -> Result<u64, CountersError> {
        self.read_totals().map(|totals| totals.writes)
    }

    /// Delta of both counters since the previous observation.
    ///
    /// An unchanged field reports exactly 0 and keeps its snapshot; a moved
    /// field reports the difference and is rebased. A field that went
    /// backwards is logged, rebased and reported as 0.
    pub fn take_io(&mut self) -> Result<IoCounters, CountersError> {
        let fresh = self.read_totals()?;
        let delta = self.snapshot.observe(fresh);
        self.warn_regression("read", delta.reads);
        self.warn_regression("write", delta.writes);
        Ok(delta.counters())
    }

    pub fn reads_taken(&mut self) -> Result<u64, CountersError> {
        let fresh = self.total_reads()?;
        let step = self.snapshot.observe_reads(fresh);
        self.warn_regression("read", step);
        Ok(step.delta())
    }

    pub fn writes_taken(&mut self) -> Result<u64, CountersError> {
        let fresh = self.total_writes()?;
        let step = self.snapshot.observe_writes(fresh);
        self.warn_regression("write", step);
        Ok(step.delta())
    }

    fn warn_regression(&self, field: &str, step: CounterStep) {
        if let CounterStep::Regressed { previous, current } = step {
            warn!(
                "{} {} counter went backwards ({} -> {}), treating as device reset",
                self.device, field, previous, current
            );
        }
    }
}

impl IoSource for BlockDeviceCounters {
    type Error = CountersError;

    fn take_io(&mut self) -> Result<IoCounters, Self::Error> {
        BlockDeviceCounters::take_io(self)
    }

    fn counters_path(&self) -> Option<&Path> {
        Some(&self.stat_file)
    }
}

/// Extract (reads, writes) from a `/sys/block/.../stat` line
pub fn parse_stat(contents: &str) -> Option<IoCounters> {
    let fields: Vec<u64> = contents
        .split_whitespace()
        .take(WRITES_FIELD + 1)
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    Some(IoCounters::new(
        *fields.get(READS_FIELD)?,
        *fields.get(WRITES_FIELD)?,
    ))
}
