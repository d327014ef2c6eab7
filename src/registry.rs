// src/registry.rs

//! In-memory mirror of everything currently watched.
//!
//! One [`WatchEntry`] per path, keyed by absolute normalized path. An entry
//! exists iff its watch handle is open: entries are inserted together with
//! the handle returned by the backend, and removing an entry hands the handle
//! back so the caller can close it.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, WatchError};
use crate::types::{EntryKind, Snapshot};
use crate::watch::backend::WatchHandle;
use crate::watch::fingerprint::Etag;

#[derive(Debug)]
pub struct WatchEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub snapshot: Option<Snapshot>,
    /// Paths whose snapshots are folded into this entry's etag.
    pub dependencies: Vec<PathBuf>,
    pub etag: Option<Etag>,
    handle: WatchHandle,
}

impl WatchEntry {
    pub fn new(path: PathBuf, kind: EntryKind, snapshot: Snapshot, handle: WatchHandle) -> Self {
        Self {
            path,
            kind,
            snapshot: Some(snapshot),
            dependencies: Vec::new(),
            etag: None,
            handle,
        }
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// Tear the entry apart, yielding the handle that still needs closing.
    pub fn into_handle(self) -> WatchHandle {
        self.handle
    }
}

#[derive(Debug, Default)]
pub struct PathRegistry {
    entries: BTreeMap<PathBuf, WatchEntry>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&WatchEntry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut WatchEntry> {
        self.entries.get_mut(path)
    }

    pub fn kind_of(&self, path: &Path) -> Option<EntryKind> {
        self.entries.get(path).map(|e| e.kind)
    }

    /// Insert a fresh entry.
    ///
    /// If the path was already tracked the previous entry is returned so its
    /// handle can be closed.
    pub fn insert(&mut self, entry: WatchEntry) -> Option<WatchEntry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    pub fn remove(&mut self, path: &Path) -> Option<WatchEntry> {
        self.entries.remove(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = &WatchEntry> {
        self.entries.values()
    }

    /// All tracked paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.keys().cloned().collect()
    }

    pub fn directories(&self) -> Vec<PathBuf> {
        self.entries
            .values()
            .filter(|e| e.kind.is_dir())
            .map(|e| e.path.clone())
            .collect()
    }

    /// Tracked immediate children of `dir`.
    pub fn children(&self, dir: &Path) -> Vec<PathBuf> {
        self.descendants(dir)
            .into_iter()
            .filter(|p| p.parent() == Some(dir))
            .collect()
    }

    /// Every tracked path strictly below `dir`, sorted.
    pub fn descendants(&self, dir: &Path) -> Vec<PathBuf> {
        self.entries
            .range::<Path, _>((
                std::ops::Bound::Excluded(dir),
                std::ops::Bound::Unbounded,
            ))
            .map(|(p, _)| p)
            .take_while(|p| p.starts_with(dir))
            .cloned()
            .collect()
    }

    /// Entries that list `path` among their dependencies (single hop).
    pub fn dependents_of(&self, path: &Path) -> Vec<PathBuf> {
        self.entries
            .values()
            .filter(|e| e.dependencies.iter().any(|d| d == path))
            .map(|e| e.path.clone())
            .collect()
    }

    /// Replace the dependency list of a tracked path.
    ///
    /// Fails without touching the registry when the path is not tracked, when
    /// it lists itself, or when the new edges would close a cycle.
    pub fn set_dependencies(&mut self, path: &Path, deps: Vec<PathBuf>) -> Result<()> {
        if !self.entries.contains_key(path) {
            return Err(WatchError::InvalidPath(path.to_path_buf()));
        }
        if deps.iter().any(|d| d == path) {
            return Err(WatchError::SelfDependency(path.to_path_buf()));
        }

        let mut seen = HashSet::new();
        let deps: Vec<PathBuf> = deps.into_iter().filter(|d| seen.insert(d.clone())).collect();

        self.check_acyclic(path, &deps)?;

        if let Some(entry) = self.entries.get_mut(path) {
            entry.dependencies = deps;
        }
        Ok(())
    }

    fn check_acyclic(&self, path: &Path, deps: &[PathBuf]) -> Result<()> {
        // Edge direction: dependency -> dependent.
        let mut graph: DiGraphMap<&Path, ()> = DiGraphMap::new();

        for entry in self.entries.values() {
            if entry.path == path {
                continue;
            }
            graph.add_node(entry.path.as_path());
            for dep in &entry.dependencies {
                graph.add_edge(dep.as_path(), entry.path.as_path(), ());
            }
        }
        graph.add_node(path);
        for dep in deps {
            graph.add_edge(dep.as_path(), path, ());
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(WatchError::DependencyCycle(format!(
                "declaring {:?} -> {:?} would create a cycle involving {:?}",
                path,
                deps,
                cycle.node_id()
            ))),
        }
    }
}
