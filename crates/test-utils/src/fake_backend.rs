#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use etagwatch::errors::{Result, WatchError};
use etagwatch::types::EntryKind;
use etagwatch::watch::{WatchBackend, WatchHandle};

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    active: BTreeMap<PathBuf, (u64, EntryKind)>,
    closed: Vec<PathBuf>,
    refused: BTreeSet<PathBuf>,
    /// Handles closed while not active, or paths watched twice.
    misuse: Vec<String>,
}

/// A `WatchBackend` that never talks to the OS.
///
/// It records which paths are subscribed so tests can assert that every
/// entry holds exactly one handle and that deleted paths were unwatched.
/// Clones share state, so keep one clone and hand the other to the watcher.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Make future `watch` calls for `path` fail.
    pub fn refuse(&self, path: impl AsRef<Path>) {
        self.lock().refused.insert(path.as_ref().to_path_buf());
    }

    pub fn allow(&self, path: impl AsRef<Path>) {
        self.lock().refused.remove(path.as_ref());
    }

    pub fn active_paths(&self) -> Vec<PathBuf> {
        self.lock().active.keys().cloned().collect()
    }

    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        self.lock().active.contains_key(path.as_ref())
    }

    pub fn kind_of(&self, path: impl AsRef<Path>) -> Option<EntryKind> {
        self.lock().active.get(path.as_ref()).map(|(_, kind)| *kind)
    }

    /// Paths unwatched so far, in order.
    pub fn closed(&self) -> Vec<PathBuf> {
        self.lock().closed.clone()
    }

    pub fn misuse(&self) -> Vec<String> {
        self.lock().misuse.clone()
    }
}

impl WatchBackend for FakeBackend {
    fn watch(&mut self, path: &Path, kind: EntryKind) -> Result<WatchHandle> {
        let mut state = self.lock();
        if state.refused.contains(path) {
            return Err(WatchError::WatchSetup {
                path: path.to_path_buf(),
                source: notify::Error::generic("refused by fake backend"),
            });
        }

        state.next_id += 1;
        let id = state.next_id;
        if state.active.insert(path.to_path_buf(), (id, kind)).is_some() {
            state.misuse.push(format!("watched twice: {}", path.display()));
        }
        Ok(WatchHandle::new(path, id))
    }

    fn unwatch(&mut self, handle: WatchHandle) {
        let mut state = self.lock();
        match state.active.get(handle.path()) {
            Some((id, _)) if *id == handle.id() => {
                state.active.remove(handle.path());
            }
            _ => state
                .misuse
                .push(format!("stale close: {} #{}", handle.path().display(), handle.id())),
        }
        state.closed.push(handle.path().to_path_buf());
    }
}
