// src/watch/traverse.rs

//! Recursive directory traversal.
//!
//! Implemented as a worklist: directories are queued, each one is listed,
//! its children are stat'ed concurrently, and every child is handed to the
//! caller's `register` callback before any of *its* children are looked at.
//! The walk is done when the queue drains.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tracing::debug;

use crate::errors::{Result, WatchError};
use crate::fs::{FileStat, FileSystem};
use crate::watch::patterns::PathFilter;

/// Stat every path concurrently on the blocking pool.
///
/// Results are returned in input order.
pub async fn stat_many(
    fs: &Arc<dyn FileSystem>,
    paths: Vec<PathBuf>,
) -> Vec<(PathBuf, anyhow::Result<Option<FileStat>>)> {
    let mut set = JoinSet::new();
    for (idx, path) in paths.iter().cloned().enumerate() {
        let fs = Arc::clone(fs);
        set.spawn_blocking(move || (idx, fs.stat(&path)));
    }

    let mut results: Vec<Option<anyhow::Result<Option<FileStat>>>> =
        paths.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, res)) => results[idx] = Some(res),
            Err(err) => debug!(error = %err, "stat task failed to join"),
        }
    }

    paths
        .into_iter()
        .zip(results)
        .map(|(path, res)| {
            let res = res.unwrap_or_else(|| Err(anyhow!("stat of {:?} did not complete", path)));
            (path, res)
        })
        .collect()
}

/// Stat a single path on the blocking pool.
pub async fn stat_path(fs: &Arc<dyn FileSystem>, path: &Path) -> anyhow::Result<Option<FileStat>> {
    let fs = Arc::clone(fs);
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || fs.stat(&path)).await?
}

/// List a directory on the blocking pool.
pub async fn list_dir(fs: &Arc<dyn FileSystem>, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let fs = Arc::clone(fs);
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || fs.read_dir(&dir)).await?
}

/// True when `dir` resolves to itself or to one of its own ancestors, which
/// happens with a symlink such as `loop -> .`. Descending into it would never
/// end.
///
/// Resolution failures answer `false`; the following stat or listing will
/// report them.
pub async fn loops_back(fs: &Arc<dyn FileSystem>, dir: &Path) -> bool {
    let Some(parent) = dir.parent() else {
        return false;
    };
    let fs = Arc::clone(fs);
    let (dir, parent) = (dir.to_path_buf(), parent.to_path_buf());

    tokio::task::spawn_blocking(move || {
        match (fs.canonicalize(&dir), fs.canonicalize(&parent)) {
            (Ok(target), Ok(parent)) => parent.starts_with(&target),
            _ => false,
        }
    })
    .await
    .unwrap_or(false)
}

/// Walk everything below `dir`, calling `register` once per discovered path.
///
/// `dir` itself is not registered; callers do that first. Children matching
/// `filter` are skipped along with their subtrees. A child that disappears
/// between listing and stat is skipped silently, and so is a directory that
/// [`loops_back`] onto an ancestor. Any other listing or stat failure, or an
/// error from `register`, aborts the walk.
pub async fn traverse<F>(
    fs: &Arc<dyn FileSystem>,
    filter: &PathFilter,
    dir: &Path,
    mut register: F,
) -> Result<()>
where
    F: FnMut(&Path, FileStat) -> Result<()>,
{
    let mut pending: VecDeque<PathBuf> = VecDeque::from([dir.to_path_buf()]);

    while let Some(current) = pending.pop_front() {
        let children = list_dir(fs, &current)
            .await
            .map_err(|err| WatchError::traversal(&current, err))?;

        let children: Vec<PathBuf> = children
            .into_iter()
            .filter(|child| {
                let excluded = filter.is_excluded(child);
                if excluded {
                    debug!(path = ?child, "excluded from traversal");
                }
                !excluded
            })
            .collect();

        for (child, stat) in stat_many(fs, children).await {
            let stat = match stat {
                Ok(Some(stat)) => stat,
                Ok(None) => {
                    debug!(path = ?child, "vanished during traversal");
                    continue;
                }
                Err(err) => return Err(WatchError::traversal(child, err)),
            };

            if stat.kind.is_dir() && loops_back(fs, &child).await {
                debug!(path = ?child, "directory links back to an ancestor; not followed");
                continue;
            }

            register(&child, stat)?;

            if stat.kind.is_dir() {
                pending.push_back(child);
            }
        }
    }

    Ok(())
}
