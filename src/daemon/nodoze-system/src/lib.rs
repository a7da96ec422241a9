//! nodoze System Integration
//!
//! Linux-facing layer: the mount table cache, block device counter
//! resolution under `/sys/block`, the sentinel file actuator and the TCP
//! reachability probe.

pub mod actuator;
pub mod block;
pub mod error;
pub mod mounts;
pub mod probe;

pub use actuator::{Action, Actuator, RANDOM_BYTE_COUNT, SENTINEL_FILE_NAME};
pub use block::{BlockDeviceCounters, BlockDevices, BLOCK_STAT_NAME, SECTOR_SIZE, SYS_BLOCK_PATH};
pub use error::{ActuatorError, CountersError, ResolveError};
pub use mounts::{MountTable, MOUNT_INFO_PATH};
pub use probe::service_available;
