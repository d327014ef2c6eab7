use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

/// What a tracked path was the last time we looked at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn is_dir(self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// Last observed stat used as change evidence.
///
/// `modified_ms` is the modification time in milliseconds since the Unix
/// epoch. Content is never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Snapshot {
    pub size: u64,
    pub modified_ms: u64,
}

impl Snapshot {
    pub fn new(size: u64, modified_ms: u64) -> Self {
        Self { size, modified_ms }
    }

    /// Build a snapshot from a size and a `SystemTime`.
    ///
    /// Times before the epoch collapse to 0.
    pub fn from_system_time(size: u64, modified: SystemTime) -> Self {
        let modified_ms = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self { size, modified_ms }
    }
}

/// Which `notify` implementation drives OS notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Platform native (inotify, FSEvents, ReadDirectoryChangesW, ...).
    Recommended,
    /// Periodic stat polling. Slower, but works on filesystems that do not
    /// deliver native events.
    Poll,
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Recommended
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recommended" | "native" => Ok(BackendKind::Recommended),
            "poll" | "polling" => Ok(BackendKind::Poll),
            other => Err(format!(
                "invalid backend: {other} (expected \"recommended\" or \"poll\")"
            )),
        }
    }
}
