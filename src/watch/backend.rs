// src/watch/backend.rs

//! Pluggable OS watch backend.
//!
//! The coordinator asks a `WatchBackend` for one subscription per tracked
//! path and closes it when the path goes away. `NotifyBackend` is the
//! production implementation; tests provide a recording fake and inject
//! `Notification`s themselves.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::engine::Notification;
use crate::errors::{Result, WatchError};
use crate::types::{BackendKind, EntryKind};

/// Opaque token for one OS-level subscription.
///
/// Not `Clone`: closing a handle consumes it, so it can be closed once.
#[derive(Debug, PartialEq, Eq)]
pub struct WatchHandle {
    path: PathBuf,
    id: u64,
}

impl WatchHandle {
    pub fn new(path: impl Into<PathBuf>, id: u64) -> Self {
        Self {
            path: path.into(),
            id,
        }
    }

    /// A handle not backed by any subscription.
    pub fn detached(path: impl Into<PathBuf>) -> Self {
        Self::new(path, 0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Trait abstracting how paths are subscribed to.
pub trait WatchBackend: Send {
    /// Start watching a single path (non-recursively for directories).
    fn watch(&mut self, path: &Path, kind: EntryKind) -> Result<WatchHandle>;

    /// Close a subscription previously returned by [`watch`](Self::watch).
    fn unwatch(&mut self, handle: WatchHandle);
}

/// A thin wrapper around [`RecommendedWatcher`] and [`PollWatcher`].
enum NotifyWatcher {
    Recommended(RecommendedWatcher),
    Polling(PollWatcher),
}

impl NotifyWatcher {
    fn watch(&mut self, path: &Path, mode: RecursiveMode) -> notify::Result<()> {
        match self {
            Self::Recommended(w) => w.watch(path, mode),
            Self::Polling(w) => w.watch(path, mode),
        }
    }

    fn unwatch(&mut self, path: &Path) -> notify::Result<()> {
        match self {
            Self::Recommended(w) => w.unwatch(path),
            Self::Polling(w) => w.unwatch(path),
        }
    }
}

/// Production backend on top of `notify`.
///
/// Dropping it stops every subscription.
pub struct NotifyBackend {
    inner: NotifyWatcher,
    next_id: u64,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl NotifyBackend {
    /// Create a backend that forwards OS events into `tx`.
    pub fn new(
        kind: BackendKind,
        poll_interval: Duration,
        tx: mpsc::UnboundedSender<Notification>,
    ) -> Result<Self> {
        // Called synchronously by notify on its own thread.
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                trace!(?event, "received notify event");
                for notification in notifications_from_event(&event) {
                    if tx.send(notification).is_err() {
                        // Coordinator is gone; nothing left to notify.
                        return;
                    }
                }
            }
            Err(err) => {
                warn!("file watch error: {err}");
                let _ = tx.send(Notification::Rescan(None));
            }
        };

        let inner = match kind {
            BackendKind::Recommended => NotifyWatcher::Recommended(
                RecommendedWatcher::new(handler, Config::default())
                    .context("creating native file watcher")?,
            ),
            BackendKind::Poll => NotifyWatcher::Polling(
                PollWatcher::new(handler, Config::default().with_poll_interval(poll_interval))
                    .context("creating polling file watcher")?,
            ),
        };

        Ok(Self { inner, next_id: 1 })
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path, kind: EntryKind) -> Result<WatchHandle> {
        self.inner
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::WatchSetup {
                path: path.to_path_buf(),
                source,
            })?;

        let id = self.next_id;
        self.next_id += 1;
        debug!(?path, ?kind, id, "watch established");
        Ok(WatchHandle::new(path, id))
    }

    fn unwatch(&mut self, handle: WatchHandle) {
        // The OS usually drops the watch by itself once the path is deleted,
        // in which case notify reports it as unknown.
        if let Err(err) = self.inner.unwatch(handle.path()) {
            debug!(path = ?handle.path(), error = %err, "unwatch failed");
        } else {
            debug!(path = ?handle.path(), id = handle.id(), "watch closed");
        }
    }
}

/// Translate a notify event into coordinator notifications.
///
/// - access events are dropped (reads are not changes)
/// - "need rescan" events and events naming no path rescan every directory
/// - anything else yields one notification per path
pub fn notifications_from_event(event: &Event) -> Vec<Notification> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }
    if event.need_rescan() || event.paths.is_empty() {
        return vec![Notification::Rescan(None)];
    }
    event.paths.iter().cloned().map(Notification::Path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, Flag, ModifyKind};

    #[test]
    fn access_events_are_ignored() {
        let event = Event::new(EventKind::Access(AccessKind::Any)).add_path("/r/a".into());
        assert!(notifications_from_event(&event).is_empty());
    }

    #[test]
    fn events_without_paths_request_full_rescan() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any));
        assert_eq!(notifications_from_event(&event), vec![Notification::Rescan(None)]);

        let flagged = Event::new(EventKind::Other)
            .add_path("/r".into())
            .set_flag(Flag::Rescan);
        assert_eq!(notifications_from_event(&flagged), vec![Notification::Rescan(None)]);
    }

    #[test]
    fn one_notification_per_path() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path("/r/a".into())
            .add_path("/r/b".into());
        assert_eq!(
            notifications_from_event(&event),
            vec![
                Notification::Path(PathBuf::from("/r/a")),
                Notification::Path(PathBuf::from("/r/b")),
            ]
        );
    }

    #[tokio::test]
    async fn notify_backend_watches_real_paths() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut backend =
            NotifyBackend::new(BackendKind::Poll, Duration::from_millis(50), tx).unwrap();

        let handle = backend.watch(dir.path(), EntryKind::Directory).unwrap();
        assert_eq!(handle.path(), dir.path());
        assert_ne!(handle.id(), 0);
        backend.unwatch(handle);
    }
}
