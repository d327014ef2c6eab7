// src/fs/mock.rs

use super::{FileStat, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { size: u64, modified_ms: u64 },
    Dir { children: BTreeSet<String>, modified_ms: u64 },
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    failing: HashSet<PathBuf>,
}

/// In-memory filesystem with explicit sizes and modification times.
///
/// Paths are used verbatim; tests should stick to absolute paths such as
/// `/r/a.txt`. Cloning shares the underlying tree.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    /// Create a filesystem containing only the directory `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let fs = Self::default();
        fs.add_dir(root);
        fs
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create or overwrite a file, creating parents as needed.
    pub fn add_file(&self, path: impl AsRef<Path>, size: u64, modified_ms: u64) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        Self::link_into_parent(&mut state.entries, &path);
        state
            .entries
            .insert(path, MockEntry::File { size, modified_ms });
    }

    /// Alias for [`add_file`](Self::add_file) that reads better in tests
    /// modifying an existing file.
    pub fn set_file(&self, path: impl AsRef<Path>, size: u64, modified_ms: u64) {
        self.add_file(path, size, modified_ms);
    }

    /// Create a directory (and parents) if it does not already exist.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        Self::ensure_dir(&mut state.entries, &path);
    }

    /// Set a directory's modification time, creating it if needed.
    pub fn set_dir_mtime(&self, path: impl AsRef<Path>, modified_ms: u64) {
        let path = path.as_ref();
        let mut state = self.lock();
        Self::ensure_dir(&mut state.entries, path);
        if let Some(MockEntry::Dir { modified_ms: m, .. }) = state.entries.get_mut(path) {
            *m = modified_ms;
        }
    }

    /// Remove a path and, for directories, everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.lock();
        state.entries.retain(|p, _| !p.starts_with(path));
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(MockEntry::Dir { children, .. }) = state.entries.get_mut(parent) {
                children.remove(&name.to_string_lossy().into_owned());
            }
        }
    }

    /// Make every `stat` / `read_dir` of `path` fail until [`heal`](Self::heal).
    pub fn fail(&self, path: impl AsRef<Path>) {
        self.lock().failing.insert(path.as_ref().to_path_buf());
    }

    pub fn heal(&self, path: impl AsRef<Path>) {
        self.lock().failing.remove(path.as_ref());
    }

    fn ensure_dir(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if entries.contains_key(path) {
            return;
        }
        Self::link_into_parent(entries, path);
        entries.insert(
            path.to_path_buf(),
            MockEntry::Dir {
                children: BTreeSet::new(),
                modified_ms: 0,
            },
        );
    }

    fn link_into_parent(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        if parent.as_os_str().is_empty() {
            return;
        }
        Self::ensure_dir(entries, parent);
        if let Some(MockEntry::Dir { children, .. }) = entries.get_mut(parent) {
            children.insert(name.to_string_lossy().into_owned());
        }
    }

    fn check(state: &MockState, path: &Path) -> Result<()> {
        if state.failing.contains(path) {
            return Err(anyhow!("injected failure: {:?}", path));
        }
        Ok(())
    }
}

impl FileSystem for MockFileSystem {
    fn stat(&self, path: &Path) -> Result<Option<FileStat>> {
        let state = self.lock();
        Self::check(&state, path)?;
        Ok(match state.entries.get(path) {
            Some(MockEntry::File { size, modified_ms }) => Some(FileStat::file(*size, *modified_ms)),
            Some(MockEntry::Dir { modified_ms, .. }) => Some(FileStat::dir(*modified_ms)),
            None => None,
        })
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.lock();
        Self::check(&state, path)?;
        match state.entries.get(path) {
            Some(MockEntry::Dir { children, .. }) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // In mock, we just return the path as is, assuming absolute paths are used in tests
        if self.lock().entries.contains_key(path) {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("File not found: {:?}", path))
        }
    }
}
