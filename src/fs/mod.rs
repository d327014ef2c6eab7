// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::types::{EntryKind, Snapshot};

pub mod mock;

/// Result of a successful stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: EntryKind,
    pub snapshot: Snapshot,
}

impl FileStat {
    pub fn file(size: u64, modified_ms: u64) -> Self {
        Self {
            kind: EntryKind::File,
            snapshot: Snapshot::new(size, modified_ms),
        }
    }

    pub fn dir(modified_ms: u64) -> Self {
        Self {
            kind: EntryKind::Directory,
            snapshot: Snapshot::new(0, modified_ms),
        }
    }
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Stat a path, following symlinks.
    ///
    /// Returns `Ok(None)` when the path does not exist; that is the common
    /// "deleted between notification and stat" case, not an error.
    fn stat(&self, path: &Path) -> Result<Option<FileStat>>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn stat(&self, path: &Path) -> Result<Option<FileStat>> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(err) if is_missing(&err) => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("stat {:?}", path)),
        };

        let modified = meta
            .modified()
            .with_context(|| format!("reading mtime of {:?}", path))?;

        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let size = if meta.is_dir() { 0 } else { meta.len() };

        Ok(Some(FileStat {
            kind,
            snapshot: Snapshot::from_system_time(size, modified),
        }))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry.with_context(|| format!("reading entry of {:?}", path))?;
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }
}

fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
