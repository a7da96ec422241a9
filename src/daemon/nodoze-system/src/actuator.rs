//! Tick/tock sentinel writer
//!
//! Each actuation rewrites a hidden sentinel file in the watched directory:
//! an empty (or missing) sentinel gets a few random bytes (tick), a
//! non-empty one is truncated (tock). The file content is the only state,
//! so the alternation survives restarts.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::info;

use crate::error::ActuatorError;

pub const SENTINEL_FILE_NAME: &str = ".nodoze";
pub const RANDOM_BYTE_COUNT: usize = 4;

/// The filesystem mutation performed by one actuation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Tick,
    Tock,
}

pub struct Actuator {
    rng: StdRng,
}

impl Actuator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn sentinel_path(dir: &Path) -> PathBuf {
        dir.join(SENTINEL_FILE_NAME)
    }

    /// Create the sentinel if it does not exist yet, leaving any existing
    /// content alone. Used to prove a directory is writable.
    pub fn prepare(dir: &Path) -> Result<(), ActuatorError> {
        let path = Self::sentinel_path(dir);
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map(drop)
            .map_err(|source| ActuatorError::Write { path, source })
    }

    pub fn actuate(&mut self, dir: &Path) -> Result<Action, ActuatorError> {
        let path = Self::sentinel_path(dir);
        let empty = match fs::metadata(&path) {
            Ok(metadata) => metadata.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(source) => return Err(ActuatorError::Inspect { path, source }),
        };

        let mut file = match File::create(&path) {
            Ok(file) => file,
            Err(source) => return Err(ActuatorError::Write { path, source }),
        };

        let action = if empty {
            let mut payload = [0u8; RANDOM_BYTE_COUNT];
            self.rng.fill_bytes(&mut payload);
            if let Err(source) = file.write_all(&payload) {
                return Err(ActuatorError::Write { path, source });
            }
            Action::Tick
        } else {
            Action::Tock
        };

        // push the change to the device so it shows up in its I/O counters now
        file.sync_all()
            .map_err(|source| ActuatorError::Write { path, source })?;

        match action {
            Action::Tick => info!("{} tick", dir.display()),
            Action::Tock => info!("{} tock", dir.display()),
        }
        Ok(action)
    }
}

impl Default for Actuator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sentinel_len(dir: &Path) -> u64 {
        fs::metadata(Actuator::sentinel_path(dir)).unwrap().len()
    }

    #[test]
    fn test_alternates_from_missing_sentinel() {
        let dir = tempdir().unwrap();
        let mut actuator = Actuator::new();
        assert!(!Actuator::sentinel_path(dir.path()).exists());

        let mut actions = Vec::new();
        for _ in 0..4 {
            let action = actuator.actuate(dir.path()).unwrap();
            let expected_len = match action {
                Action::Tick => RANDOM_BYTE_COUNT as u64,
                Action::Tock => 0,
            };
            assert_eq!(sentinel_len(dir.path()), expected_len);
            actions.push(action);
        }
        assert_eq!(
            actions,
            vec![Action::Tick, Action::Tock, Action::Tick, Action::Tock]
        );
    }

    #[test]
    fn test_existing_payload_means_tock() {
        let dir = tempdir().unwrap();
        fs::write(Actuator::sentinel_path(dir.path()), b"left over").unwrap();
        let mut actuator = Actuator::new();
        assert_eq!(actuator.actuate(dir.path()).unwrap(), Action::Tock);
        assert_eq!(sentinel_len(dir.path()), 0);
    }

    #[test]
    fn test_prepare_keeps_content() {
        let dir = tempdir().unwrap();
        Actuator::prepare(dir.path()).unwrap();
        assert_eq!(sentinel_len(dir.path()), 0);

        fs::write(Actuator::sentinel_path(dir.path()), b"abcd").unwrap();
        Actuator::prepare(dir.path()).unwrap();
        assert_eq!(sentinel_len(dir.path()), 4);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("gone");
        let mut actuator = Actuator::new();
        assert!(actuator.actuate(&gone).is_err());
        assert!(Actuator::prepare(&gone).is_err());
    }
}
