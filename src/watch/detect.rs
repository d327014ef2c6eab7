// src/watch/detect.rs

//! Size/mtime based change detection.
//!
//! Content is never read. A write that preserves both size and mtime goes
//! unnoticed, and a touch without a real edit is reported as a modification.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::fs::{FileStat, FileSystem};
use crate::registry::PathRegistry;
use crate::watch::traverse::stat_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    New,
    Modified,
    Unmodified,
    Deleted,
}

/// Outcome of a detection pass: the verdict plus the stat it was based on
/// (absent when the path is gone).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub change: Change,
    pub stat: Option<FileStat>,
}

/// Classify an already observed stat against the registry.
pub fn classify(registry: &PathRegistry, path: &Path, stat: Option<FileStat>) -> Detection {
    let known = registry.get(path).and_then(|e| e.snapshot.map(|s| (e.kind, s)));
    let change = match (stat, known) {
        (None, _) => Change::Deleted,
        (Some(_), None) => Change::New,
        (Some(now), Some((kind, before))) => {
            if now.kind != kind
                || now.snapshot.modified_ms != before.modified_ms
                || now.snapshot.size != before.size
            {
                Change::Modified
            } else {
                Change::Unmodified
            }
        }
    };
    Detection { change, stat }
}

/// Stat `path` and classify it.
///
/// Only stat failures other than "not found" are errors.
pub async fn detect_change(
    fs: &Arc<dyn FileSystem>,
    registry: &PathRegistry,
    path: &Path,
) -> Result<Detection> {
    let stat = stat_path(fs, path).await?;
    Ok(classify(registry, path, stat))
}
