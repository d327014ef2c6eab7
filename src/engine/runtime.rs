// src/engine/runtime.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{Result, WatchError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::backend::{NotifyBackend, WatchBackend};
use crate::watch::patterns::PathFilter;

use super::core::WatchCore;
use super::{ChangeListener, Notification, WatchEvent, WatchOptions};

/// Requests from a [`Watcher`] handle to the coordinator task.
enum Command {
    Declare {
        path: PathBuf,
        deps: Vec<PathBuf>,
        reply: oneshot::Sender<Result<()>>,
    },
    Settle {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running watch.
///
/// A single background task owns the [`WatchCore`] and processes OS
/// notifications and caller commands one at a time. Events are delivered on
/// the receiver returned by [`Watcher::start`]; the channel closes once the
/// watcher is shut down.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) also
/// stops the task and closes every watch, just not synchronously.
pub struct Watcher {
    root: PathBuf,
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Start watching `options.root` with the real filesystem and a
    /// `notify` backend.
    ///
    /// Returns once the whole tree is registered and `Initialized` has been
    /// queued on the event channel.
    pub async fn start(
        options: WatchOptions,
    ) -> Result<(Watcher, mpsc::UnboundedReceiver<WatchEvent>)> {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let backend = NotifyBackend::new(options.backend, options.poll_interval, notify_tx)?;
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

        Self::start_with(options, fs, Box::new(backend), notify_rx).await
    }

    /// Start with an explicit filesystem, backend and notification source.
    pub async fn start_with(
        options: WatchOptions,
        fs: Arc<dyn FileSystem>,
        backend: Box<dyn WatchBackend>,
        notifications: mpsc::UnboundedReceiver<Notification>,
    ) -> Result<(Watcher, mpsc::UnboundedReceiver<WatchEvent>)> {
        let WatchOptions {
            root,
            exclude,
            dependencies,
            listener,
            ..
        } = options;

        let root = fs
            .canonicalize(&root)
            .map_err(|err| WatchError::traversal(&root, err))?;
        let filter = PathFilter::new(&root, &exclude)
            .map_err(|err| WatchError::ConfigError(format!("{err:#}")))?;

        info!(root = ?root, excludes = ?exclude, "starting watcher");

        let mut core = WatchCore::new(root.clone(), fs, backend, filter);
        if let Err(err) = core.initialize(&dependencies).await {
            // Whatever got registered before the failure is released.
            core.shutdown();
            return Err(err);
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let emitter = Emitter {
            tx: event_tx,
            listener,
        };
        emitter.emit(WatchEvent::Initialized);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_loop(core, notifications, cmd_rx, emitter));

        Ok((Watcher { root, cmd_tx, task }, event_rx))
    }

    /// Canonical root being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replace the dependency list of `path`. Relative paths resolve against
    /// the root.
    pub async fn declare_dependencies<P, I, D>(&self, path: P, deps: I) -> Result<()>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = D>,
        D: AsRef<Path>,
    {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Declare {
            path: path.as_ref().to_path_buf(),
            deps: deps.into_iter().map(|d| d.as_ref().to_path_buf()).collect(),
            reply,
        })?;
        rx.await.map_err(|_| stopped())?
    }

    /// Wait until every notification queued so far has been processed.
    pub async fn settle(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Settle { reply })?;
        rx.await.map_err(|_| stopped())
    }

    /// Close every watch and stop the coordinator task.
    pub async fn shutdown(self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown { reply })?;
        rx.await.map_err(|_| stopped())?;
        self.task
            .await
            .map_err(|err| WatchError::Other(anyhow!("watcher task failed: {err}")))?;
        info!(root = ?self.root, "watcher shut down");
        Ok(())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.cmd_tx.send(command).map_err(|_| stopped())
    }
}

fn stopped() -> WatchError {
    WatchError::Other(anyhow!("watcher is no longer running"))
}

/// Event sink shared by the coordinator loop.
struct Emitter {
    tx: mpsc::UnboundedSender<WatchEvent>,
    listener: Option<ChangeListener>,
}

impl Emitter {
    fn emit(&self, event: WatchEvent) {
        debug!(?event, "emitting event");
        if let (Some(listener), WatchEvent::Changed { path, etag }) = (&self.listener, &event) {
            listener(path, etag);
        }
        // A dropped receiver just means nobody is listening.
        let _ = self.tx.send(event);
    }

    fn emit_all(&self, events: Vec<WatchEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Coordinator loop.
///
/// Pending notifications always win over commands, so a `Settle` reply means
/// everything queued before it has been handled.
async fn run_loop(
    mut core: WatchCore,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    emitter: Emitter,
) {
    info!("watcher loop started");
    let mut notifications_open = true;

    loop {
        tokio::select! {
            biased;

            maybe = notifications.recv(), if notifications_open => match maybe {
                Some(notification) => emitter.emit_all(core.handle(notification).await),
                None => {
                    warn!("notification source closed; only commands will be served");
                    notifications_open = false;
                }
            },

            command = commands.recv() => match command {
                Some(Command::Declare { path, deps, reply }) => {
                    let res = core
                        .declare_dependencies(&path, deps)
                        .map(|events| emitter.emit_all(events));
                    let _ = reply.send(res);
                }
                Some(Command::Settle { reply }) => {
                    let _ = reply.send(());
                }
                Some(Command::Shutdown { reply }) => {
                    core.shutdown();
                    let _ = reply.send(());
                    break;
                }
                None => {
                    debug!("all watcher handles dropped");
                    core.shutdown();
                    break;
                }
            },
        }
    }

    info!("watcher loop exiting");
}
