#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use etagwatch::engine::{Notification, WatchEvent, WatchOptions, Watcher};
use etagwatch::errors::Result;
use etagwatch::fs::mock::MockFileSystem;
use etagwatch::fs::FileSystem;

use crate::fake_backend::FakeBackend;

/// A running watcher over a [`MockFileSystem`] and [`FakeBackend`].
///
/// Tests mutate `fs`, then call [`notify`](Self::notify) the way the OS
/// would, then [`settle`](Self::settle) to collect the resulting events.
pub struct Harness {
    pub fs: MockFileSystem,
    pub backend: FakeBackend,
    pub watcher: Watcher,
    pub events: mpsc::UnboundedReceiver<WatchEvent>,
    notify_tx: mpsc::UnboundedSender<Notification>,
}

impl Harness {
    /// Start watching and consume the `Initialized` event.
    pub async fn start(fs: MockFileSystem, options: WatchOptions) -> Result<Self> {
        Self::start_with_backend(fs, FakeBackend::new(), options).await
    }

    pub async fn start_with_backend(
        fs: MockFileSystem,
        backend: FakeBackend,
        options: WatchOptions,
    ) -> Result<Self> {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());

        let (watcher, mut events) =
            Watcher::start_with(options, shared, Box::new(backend.clone()), notify_rx).await?;

        match events.try_recv() {
            Ok(WatchEvent::Initialized) => {}
            other => panic!("expected Initialized first, got {other:?}"),
        }

        Ok(Self {
            fs,
            backend,
            watcher,
            events,
            notify_tx,
        })
    }

    pub fn root(&self) -> &Path {
        self.watcher.root()
    }

    /// Deliver an OS notification for `path`.
    pub fn notify(&self, path: impl Into<PathBuf>) {
        self.notify_tx
            .send(Notification::Path(path.into()))
            .expect("watcher loop is gone");
    }

    /// Deliver a "rescan" notification (`None` = everything).
    pub fn rescan(&self, dir: Option<PathBuf>) {
        self.notify_tx
            .send(Notification::Rescan(dir))
            .expect("watcher loop is gone");
    }

    /// Wait for queued notifications to be processed and return every event
    /// emitted since the last call.
    pub async fn settle(&mut self) -> Vec<WatchEvent> {
        crate::with_timeout(self.watcher.settle())
            .await
            .expect("watcher stopped while settling");

        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub async fn shutdown(self) -> Result<()> {
        self.watcher.shutdown().await
    }
}
