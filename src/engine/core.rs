// src/engine/core.rs

//! Coordinator state.
//!
//! `WatchCore` is the only owner of the [`PathRegistry`]. Every mutation goes
//! through its methods, and the async shell in [`super::runtime`] calls them
//! one at a time, so no locking is needed.
//!
//! Per path the flow is: notification -> detect -> (register / update /
//! remove) -> expand to dependents -> recompute etags -> events. A
//! notification that names a tracked directory is treated as "something in
//! here changed" and triggers a differential rescan of that directory's
//! immediate children.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::engine::{Notification, WatchEvent};
use crate::errors::{Result, WatchError};
use crate::fs::{FileStat, FileSystem};
use crate::registry::{PathRegistry, WatchEntry};
use crate::types::EntryKind;
use crate::watch::backend::WatchBackend;
use crate::watch::detect::{classify, detect_change, Change, Detection};
use crate::watch::expand::expand_dependents;
use crate::watch::fingerprint::refresh_etag;
use crate::watch::path_utils::resolve;
use crate::watch::patterns::PathFilter;
use crate::watch::traverse::{list_dir, loops_back, stat_many, stat_path, traverse};

pub struct WatchCore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    backend: Box<dyn WatchBackend>,
    registry: PathRegistry,
    filter: PathFilter,
}

impl fmt::Debug for WatchCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchCore")
            .field("root", &self.root)
            .field("entries", &self.registry.len())
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl WatchCore {
    pub fn new(
        root: PathBuf,
        fs: Arc<dyn FileSystem>,
        backend: Box<dyn WatchBackend>,
        filter: PathFilter,
    ) -> Self {
        Self {
            root,
            fs,
            backend,
            registry: PathRegistry::new(),
            filter,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read-only view of the registry (for tests and diagnostics).
    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    /// Register the root and everything below it, apply the initial
    /// dependency declarations, then compute every entry's etag.
    ///
    /// Any traversal or watch failure is returned as-is; the caller must not
    /// consider the watcher initialized.
    pub async fn initialize(
        &mut self,
        dependencies: &[(PathBuf, Vec<PathBuf>)],
    ) -> Result<WatchEvent> {
        let root = self.root.clone();

        let stat = stat_path(&self.fs, &root)
            .await
            .map_err(|err| WatchError::traversal(&root, err))?
            .ok_or_else(|| WatchError::traversal(&root, anyhow!("root does not exist")))?;
        if !stat.kind.is_dir() {
            return Err(WatchError::traversal(&root, anyhow!("root is not a directory")));
        }

        register_entry(&mut self.registry, &mut *self.backend, &root, stat)?;
        let mut discovered = Vec::new();
        self.walk(&root, &mut discovered).await?;

        info!(
            root = ?root,
            entries = self.registry.len(),
            "initial traversal complete"
        );

        for (path, deps) in dependencies {
            let path = resolve(&root, path);
            let deps = deps.iter().map(|d| resolve(&root, d)).collect();
            match self.registry.set_dependencies(&path, deps) {
                Ok(()) => {}
                Err(WatchError::InvalidPath(missing)) => {
                    warn!(path = ?missing, "dependencies declared for a path that is not watched; skipping");
                }
                Err(err) => return Err(err),
            }
        }

        for path in self.registry.paths() {
            refresh_etag(&mut self.registry, &path);
        }

        Ok(WatchEvent::Initialized)
    }

    /// Handle one OS notification and return the resulting events.
    pub async fn handle(&mut self, notification: Notification) -> Vec<WatchEvent> {
        debug!(?notification, "handling notification");

        match notification {
            Notification::Rescan(None) => {
                let mut events = Vec::new();
                for dir in self.registry.directories() {
                    // An earlier rescan in this loop may have dropped it.
                    if self.registry.kind_of(&dir) == Some(EntryKind::Directory) {
                        events.extend(self.rescan_directory(&dir).await);
                    }
                }
                events
            }
            Notification::Rescan(Some(dir)) => {
                let dir = resolve(&self.root, &dir);
                self.rescan_directory(&dir).await
            }
            Notification::Path(path) => {
                let path = resolve(&self.root, &path);
                if !path.starts_with(&self.root) || self.filter.is_excluded(&path) {
                    debug!(?path, "ignoring notification outside the watched tree");
                    return Vec::new();
                }
                match self.registry.kind_of(&path) {
                    Some(EntryKind::Directory) => self.rescan_directory(&path).await,
                    _ => self.handle_path(&path).await,
                }
            }
        }
    }

    /// Replace the dependency list of a tracked path.
    ///
    /// Returns a `Changed` event when the path is a file and its etag moved.
    pub fn declare_dependencies(
        &mut self,
        path: &Path,
        deps: Vec<PathBuf>,
    ) -> Result<Vec<WatchEvent>> {
        let path = resolve(&self.root, path);
        let deps = deps.iter().map(|d| resolve(&self.root, d)).collect();

        self.registry.set_dependencies(&path, deps)?;

        let previous = self.registry.get(&path).and_then(|e| e.etag.clone());
        let etag = refresh_etag(&mut self.registry, &path);
        debug!(?path, ?etag, "dependencies declared");

        match (etag, self.registry.kind_of(&path)) {
            (Some(etag), Some(EntryKind::File)) if previous.as_ref() != Some(&etag) => {
                Ok(vec![WatchEvent::Changed { path, etag }])
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Close every watch handle and forget everything.
    pub fn shutdown(&mut self) {
        let paths = self.registry.paths();
        let count = paths.len();
        for path in paths {
            if let Some(entry) = self.registry.remove(&path) {
                self.backend.unwatch(entry.into_handle());
            }
        }
        info!(closed = count, "all watches closed");
    }

    async fn handle_path(&mut self, path: &Path) -> Vec<WatchEvent> {
        match detect_change(&self.fs, &self.registry, path).await {
            Ok(detection) => self.apply(path, detection).await,
            Err(err) => vec![error_event(path, err)],
        }
    }

    /// The per-path state machine.
    async fn apply(&mut self, path: &Path, detection: Detection) -> Vec<WatchEvent> {
        debug!(?path, change = ?detection.change, "change detected");

        match (detection.change, detection.stat) {
            (Change::Unmodified, _) => Vec::new(),

            (Change::Deleted, _) | (_, None) => {
                if !self.registry.contains(path) {
                    return Vec::new();
                }
                let mut gone = vec![path.to_path_buf()];
                gone.extend(self.registry.descendants(path));
                self.fan_out(gone).await
            }

            (Change::Modified, Some(stat)) if self.registry.kind_of(path) != Some(stat.kind) => {
                // File replaced by a directory or the other way around.
                let (mut events, removed) = self.remove_subtree(path);
                let (added_events, mut changed) = self.register_new(path, stat).await;
                events.extend(added_events);
                changed.extend(removed.into_iter().filter(|p| p != path));
                events.extend(self.fan_out(changed).await);
                events
            }

            (Change::Modified, Some(stat)) => {
                self.update_snapshot(path, stat);
                if stat.kind.is_dir() {
                    // Silent itself, but dependents still need a new etag.
                    refresh_etag(&mut self.registry, path);
                }
                self.fan_out(vec![path.to_path_buf()]).await
            }

            (Change::New, Some(stat)) => {
                let (mut events, added) = self.register_new(path, stat).await;
                events.extend(self.fan_out(added).await);
                events
            }
        }
    }

    /// Differential rescan of a tracked directory's immediate children.
    async fn rescan_directory(&mut self, dir: &Path) -> Vec<WatchEvent> {
        if self.registry.kind_of(dir) != Some(EntryKind::Directory) {
            return self.handle_path(dir).await;
        }

        let own = match detect_change(&self.fs, &self.registry, dir).await {
            Ok(detection) => detection,
            Err(err) => return vec![error_event(dir, err)],
        };
        let mut events = Vec::new();
        let mut changed = Vec::new();

        match (own.change, own.stat) {
            (Change::Deleted, _) => return self.apply(dir, own).await,
            (_, Some(stat)) if !stat.kind.is_dir() => return self.apply(dir, own).await,
            (Change::Modified, Some(stat)) => {
                self.update_snapshot(dir, stat);
                refresh_etag(&mut self.registry, dir);
                changed.push(dir.to_path_buf());
            }
            _ => {}
        }

        let listed = match list_dir(&self.fs, dir).await {
            Ok(children) => children,
            Err(err) => {
                let err = WatchError::traversal(dir, err);
                warn!(path = ?dir, error = %err, "rescan failed");
                return vec![error_event(dir, err)];
            }
        };
        let listed: Vec<PathBuf> = listed
            .into_iter()
            .filter(|child| !self.filter.is_excluded(child))
            .collect();
        let listed_set: HashSet<&PathBuf> = listed.iter().collect();

        for known in self.registry.children(dir) {
            if !listed_set.contains(&known) {
                let below = self.registry.descendants(&known);
                changed.push(known);
                changed.extend(below);
            }
        }

        for (child, stat) in stat_many(&self.fs, listed).await {
            let stat = match stat {
                Ok(stat) => stat,
                Err(err) => {
                    events.push(error_event(&child, err));
                    continue;
                }
            };

            let detection = classify(&self.registry, &child, stat);
            match (detection.change, detection.stat) {
                (Change::Unmodified, _) => {}
                (Change::Modified, Some(stat)) if self.registry.kind_of(&child) == Some(stat.kind) => {
                    self.update_snapshot(&child, stat);
                    if stat.kind.is_dir() {
                        refresh_etag(&mut self.registry, &child);
                    }
                    changed.push(child);
                }
                (Change::New, Some(stat)) => {
                    let (added_events, added) = self.register_new(&child, stat).await;
                    events.extend(added_events);
                    changed.extend(added);
                }
                (Change::Deleted, _) => {
                    // Listed, then gone before the stat landed.
                    if self.registry.contains(&child) {
                        changed.push(child.clone());
                        changed.extend(self.registry.descendants(&child));
                    }
                }
                _ => events.extend(self.apply(&child, detection).await),
            }
        }

        events.extend(self.fan_out(changed).await);
        events
    }

    /// Register a path that just appeared and, for directories, everything
    /// below it. Returns `Added` events (plus any error) and the list of
    /// newly registered paths.
    async fn register_new(&mut self, path: &Path, stat: FileStat) -> (Vec<WatchEvent>, Vec<PathBuf>) {
        let parent_watched = path
            .parent()
            .is_some_and(|p| self.registry.kind_of(p) == Some(EntryKind::Directory));
        if !parent_watched {
            debug!(?path, "parent directory is not watched; waiting for its own event");
            return (Vec::new(), Vec::new());
        }

        if stat.kind.is_dir() && loops_back(&self.fs, path).await {
            debug!(?path, "directory links back to an ancestor; not followed");
            return (Vec::new(), Vec::new());
        }

        let mut events = Vec::new();
        if let Err(err) = register_entry(&mut self.registry, &mut *self.backend, path, stat) {
            warn!(?path, error = %err, "failed to watch new path");
            return (vec![error_event(path, err)], Vec::new());
        }

        let mut added = vec![path.to_path_buf()];
        if stat.kind.is_dir() {
            if let Err(err) = self.walk(path, &mut added).await {
                warn!(?path, error = %err, "failed to traverse new directory");
                events.push(error_event(path, err));
            }
            let dirs: Vec<PathBuf> = added
                .iter()
                .filter(|p| self.registry.kind_of(p) == Some(EntryKind::Directory))
                .cloned()
                .collect();
            for dir in &dirs {
                refresh_etag(&mut self.registry, dir);
            }
        }

        info!(?path, count = added.len(), "new paths watched");
        let mut added_events: Vec<WatchEvent> = added
            .iter()
            .map(|p| WatchEvent::Added { path: p.clone() })
            .collect();
        added_events.append(&mut events);
        (added_events, added)
    }

    /// Expand `changed` to direct dependents, then settle each path: gone
    /// paths are unwatched and removed, surviving files get a fresh etag.
    async fn fan_out(&mut self, changed: Vec<PathBuf>) -> Vec<WatchEvent> {
        if changed.is_empty() {
            return Vec::new();
        }

        let expanded = expand_dependents(&self.registry, &changed);
        debug!(changed = changed.len(), expanded = expanded.len(), "dependency expansion");

        let mut events = Vec::new();
        for (path, stat) in stat_many(&self.fs, expanded).await {
            match stat {
                Err(err) => events.push(error_event(&path, err)),
                Ok(None) => {
                    if let Some(entry) = self.registry.remove(&path) {
                        let kind = entry.kind;
                        self.backend.unwatch(entry.into_handle());
                        if kind == EntryKind::File {
                            info!(?path, "deleted");
                            events.push(WatchEvent::Deleted { path });
                        }
                    }
                }
                Ok(Some(stat)) if stat.kind.is_dir() => {}
                Ok(Some(stat)) => {
                    if self.registry.kind_of(&path) != Some(EntryKind::File) {
                        continue;
                    }
                    let previous = self.registry.get(&path).and_then(|e| e.etag.clone());
                    self.update_snapshot(&path, stat);
                    match refresh_etag(&mut self.registry, &path) {
                        Some(etag) if previous.as_ref() != Some(&etag) => {
                            info!(?path, %etag, "changed");
                            events.push(WatchEvent::Changed { path, etag });
                        }
                        _ => {}
                    }
                }
            }
        }
        events
    }

    /// Remove `path` and everything below it right away.
    fn remove_subtree(&mut self, path: &Path) -> (Vec<WatchEvent>, Vec<PathBuf>) {
        let mut paths = vec![path.to_path_buf()];
        paths.extend(self.registry.descendants(path));

        let mut events = Vec::new();
        for p in &paths {
            if let Some(entry) = self.registry.remove(p) {
                let kind = entry.kind;
                self.backend.unwatch(entry.into_handle());
                if kind == EntryKind::File {
                    events.push(WatchEvent::Deleted { path: p.clone() });
                }
            }
        }
        (events, paths)
    }

    fn update_snapshot(&mut self, path: &Path, stat: FileStat) {
        if let Some(entry) = self.registry.get_mut(path) {
            entry.snapshot = Some(stat.snapshot);
        }
    }

    /// Traverse below `dir`, registering every path found.
    ///
    /// Paths registered before a failure stay registered and are appended to
    /// `discovered` either way.
    async fn walk(&mut self, dir: &Path, discovered: &mut Vec<PathBuf>) -> Result<()> {
        let Self {
            fs,
            backend,
            registry,
            filter,
            ..
        } = self;

        traverse(fs, filter, dir, |path, stat| {
            register_entry(registry, &mut **backend, path, stat)?;
            discovered.push(path.to_path_buf());
            Ok(())
        })
        .await
    }
}

/// Watch `path` and record it. Already tracked paths only get their snapshot
/// refreshed, so a path never holds two handles.
fn register_entry(
    registry: &mut PathRegistry,
    backend: &mut dyn WatchBackend,
    path: &Path,
    stat: FileStat,
) -> Result<()> {
    if let Some(entry) = registry.get_mut(path) {
        entry.snapshot = Some(stat.snapshot);
        return Ok(());
    }

    let handle = backend.watch(path, stat.kind)?;
    registry.insert(WatchEntry::new(
        path.to_path_buf(),
        stat.kind,
        stat.snapshot,
        handle,
    ));
    Ok(())
}

fn error_event(path: &Path, err: impl fmt::Display) -> WatchEvent {
    WatchEvent::Error {
        path: path.to_path_buf(),
        message: format!("{err:#}"),
    }
}
