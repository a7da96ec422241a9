use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while mapping a path or device name to its counters file.
///
/// A `BlockDeviceCounters` is never handed out when any of these occur.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("failed to read mount table {path}: {source}")]
    MountTable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("{0} is not a mount point")]
    NotMounted(PathBuf),
    #[error("no mounted filesystem is backed by {0}")]
    UnknownDevice(String),
    #[error("no block device or parent disk found for {0}")]
    NoBlockDevice(String),
    #[error("no I/O statistics file for {device} under {disk}")]
    NoCountersFile { device: String, disk: PathBuf },
}

/// Failures while reading a counters file that was resolved earlier
#[derive(Error, Debug)]
pub enum CountersError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed block statistics in {path}: {line:?}")]
    Malformed { path: PathBuf, line: String },
}

#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("failed to inspect {path}: {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
