// src/engine/mod.rs

//! Watch coordination engine.
//!
//! - [`core`] owns the registry and implements the per-path change handling
//!   (detect, expand dependencies, fingerprint, emit).
//! - [`runtime`] is the async shell: a single task owning the core that
//!   consumes OS notifications and caller commands one at a time, which is
//!   what serializes every registry mutation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::types::BackendKind;
use crate::watch::fingerprint::Etag;

/// Events flowing from the OS backend into the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Something happened at (or directly inside, for directories) this path.
    Path(PathBuf),
    /// The OS could not say what changed. `Some(dir)` rescans that directory,
    /// `None` rescans every tracked directory.
    Rescan(Option<PathBuf>),
}

/// Events emitted to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The whole tree is registered and every entry has an etag.
    Initialized,
    /// A file's fingerprint changed (own stat or a dependency's).
    Changed { path: PathBuf, etag: Etag },
    /// A path started being watched after initialization.
    Added { path: PathBuf },
    /// A watched file disappeared.
    Deleted { path: PathBuf },
    /// A recoverable failure; the rest of the tree is still watched.
    Error { path: PathBuf, message: String },
}

impl WatchEvent {
    pub fn path(&self) -> Option<&Path> {
        match self {
            WatchEvent::Initialized => None,
            WatchEvent::Changed { path, .. }
            | WatchEvent::Added { path }
            | WatchEvent::Deleted { path }
            | WatchEvent::Error { path, .. } => Some(path),
        }
    }
}

/// Callback invoked for every `Changed` event.
pub type ChangeListener = Arc<dyn Fn(&Path, &Etag) + Send + Sync>;

/// Options for [`Watcher::start`].
#[derive(Clone)]
pub struct WatchOptions {
    pub root: PathBuf,
    pub backend: BackendKind,
    /// Only used by [`BackendKind::Poll`].
    pub poll_interval: Duration,
    pub exclude: Vec<String>,
    /// Dependencies applied after the initial traversal, before etags are
    /// computed. Relative paths resolve against the root.
    pub dependencies: Vec<(PathBuf, Vec<PathBuf>)>,
    pub listener: Option<ChangeListener>,
}

impl fmt::Debug for WatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchOptions")
            .field("root", &self.root)
            .field("backend", &self.backend)
            .field("poll_interval", &self.poll_interval)
            .field("exclude", &self.exclude)
            .field("dependencies", &self.dependencies)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

impl WatchOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backend: BackendKind::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            exclude: Vec::new(),
            dependencies: Vec::new(),
            listener: None,
        }
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn dependency<I, D>(mut self, path: impl Into<PathBuf>, deps: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<PathBuf>,
    {
        self.dependencies
            .push((path.into(), deps.into_iter().map(Into::into).collect()));
        self
    }

    pub fn on_change<F>(mut self, listener: F) -> Self
    where
        F: Fn(&Path, &Etag) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }
}

pub mod core;
pub mod runtime;

pub use self::core::WatchCore;
pub use self::runtime::Watcher;
