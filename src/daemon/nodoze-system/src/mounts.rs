//! Mount point -> device source cache built from the kernel mount table

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::ResolveError;

pub const MOUNT_INFO_PATH: &str = "/proc/self/mountinfo";

/// Parsed mount point -> mount source mapping
pub type MountMap = HashMap<PathBuf, PathBuf>;

/// Cached view of the mount table.
///
/// The map is built once on first use and replaced wholesale by
/// [`MountTable::refresh`]; readers hold an `Arc` to the map they were given,
/// so a refresh never mutates a map someone is iterating.
#[derive(Debug)]
pub struct MountTable {
    source: PathBuf,
    entries: RwLock<Option<Arc<MountMap>>>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::with_source(MOUNT_INFO_PATH)
    }

    /// Read the table from a mountinfo-formatted file other than the default
    pub fn with_source(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            entries: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Current mapping, loading it on first use
    pub fn snapshot(&self) -> Result<Arc<MountMap>, ResolveError> {
        {
            let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(entries) = guard.as_ref() {
                return Ok(Arc::clone(entries));
            }
        }
        self.refresh()
    }

    /// Re-read the mount table and swap in the fresh mapping
    pub fn refresh(&self) -> Result<Arc<MountMap>, ResolveError> {
        let contents =
            std::fs::read_to_string(&self.source).map_err(|source| ResolveError::MountTable {
                path: self.source.clone(),
                source,
            })?;
        let fresh = Arc::new(parse_mountinfo(&contents));
        debug!(
            "Loaded {} mount entries from {}",
            fresh.len(),
            self.source.display()
        );

        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::clone(&fresh));
        Ok(fresh)
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `/proc/<pid>/mountinfo` contents.
///
/// Line layout (see proc(5)):
/// `id parent major:minor root mount_point options [optional...] - fstype source super_options`
///
/// Lines that do not follow the layout are skipped. A mount point listed
/// twice keeps the later entry, which is the one on top.
pub fn parse_mountinfo(contents: &str) -> MountMap {
    let mut entries = MountMap::new();
    for line in contents.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 7 {
            continue;
        }
        let Some(separator) = fields.iter().skip(6).position(|f| *f == "-") else {
            continue;
        };
        let Some(source) = fields.get(6 + separator + 2) else {
            continue;
        };
        entries.insert(
            PathBuf::from(unescape(fields[4])),
            PathBuf::from(unescape(source)),
        );
    }
    entries
}

/// Decode the `\ooo` octal escapes the kernel uses for space, tab, newline
/// and backslash
fn unescape(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_escape(&bytes[i + 1..i + 4]) {
            let value = (bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0');
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_escape(digits: &[u8]) -> bool {
    digits.len() == 3 && digits[0] <= b'3' && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}
