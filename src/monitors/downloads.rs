//! Downloads watcher
//!
//! Subscribes to creation events in one directory (non-recursive) and hands
//! each created path to a [`CreationHandler`] on a dedicated thread. Events
//! are handled one at a time; while a handler runs, later events wait in the
//! channel rather than being dropped.

use crate::config::WatchBackend;
use crate::error::{AgentError, Result};
use notify::event::CreateKind;
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How often the idle delivery loop checks for a stop request.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// A path that just appeared in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPath {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Receives creation events on the watcher thread.
pub trait CreationHandler: Send + 'static {
    fn on_created(&mut self, event: CreatedPath);
}

impl<F> CreationHandler for F
where
    F: FnMut(CreatedPath) + Send + 'static,
{
    fn on_created(&mut self, event: CreatedPath) {
        self(event)
    }
}

/// Normalize a backend event into created paths. Anything other than a
/// creation yields nothing.
pub fn created_paths(event: Event) -> Vec<CreatedPath> {
    let kind = match event.kind {
        EventKind::Create(kind) => kind,
        _ => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| {
            let is_dir = match kind {
                CreateKind::Folder => true,
                CreateKind::File => false,
                _ => path.is_dir(),
            };
            CreatedPath { path, is_dir }
        })
        .collect()
}

fn build_watcher(
    backend: WatchBackend,
    tx: Sender<notify::Result<Event>>,
) -> notify::Result<Box<dyn Watcher + Send>> {
    match backend {
        WatchBackend::Native => Ok(Box::new(RecommendedWatcher::new(tx, Config::default())?)),
        WatchBackend::Poll { interval } => Ok(Box::new(PollWatcher::new(
            tx,
            Config::default().with_poll_interval(interval),
        )?)),
    }
}

/// A live subscription plus the thread delivering its events.
pub struct FileWatcher {
    dir: PathBuf,
    shutdown: Arc<AtomicBool>,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl FileWatcher {
    /// Subscribe to `dir` and start delivering to `handler`.
    ///
    /// Subscription errors are returned here, before any thread is spawned.
    pub fn spawn<H: CreationHandler>(dir: &Path, backend: WatchBackend, handler: H) -> Result<Self> {
        if !dir.is_dir() {
            return Err(AgentError::Start(format!(
                "watch directory does not exist: {}",
                dir.display()
            )));
        }

        let (tx, rx) = mpsc::channel();
        let mut watcher =
            build_watcher(backend, tx).map_err(|e| AgentError::Start(e.to_string()))?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| AgentError::Start(format!("cannot watch {}: {}", dir.display(), e)))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();

        let thread_shutdown = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("dlguard-watcher".to_string())
            .spawn(move || {
                // the subscription lives exactly as long as the delivery loop
                let _watcher = watcher;
                deliver(rx, &thread_shutdown, handler);
                let _ = done_tx.send(());
            })
            .map_err(|e| AgentError::Start(format!("cannot spawn watcher thread: {}", e)))?;

        info!(dir = %dir.display(), backend = ?backend, "watching for new files");

        Ok(Self {
            dir: dir.to_path_buf(),
            shutdown,
            done_rx,
            thread: Some(thread),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stop delivery and wait up to `timeout` for the in-flight event.
    ///
    /// On timeout the thread is left to finish on its own and `Ok` is
    /// returned; its last audit write is then best effort.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);

        let thread = match self.thread.take() {
            Some(thread) => thread,
            None => return Ok(()),
        };

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => thread
                .join()
                .map_err(|_| AgentError::Stop("watcher thread panicked".to_string())),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    dir = %self.dir.display(),
                    timeout_ms = timeout.as_millis() as u64,
                    "watcher still busy after timeout, detaching"
                );
                Ok(())
            }
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn deliver<H: CreationHandler>(
    rx: Receiver<notify::Result<Event>>,
    shutdown: &AtomicBool,
    mut handler: H,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match rx.recv_timeout(SHUTDOWN_POLL) {
            Ok(Ok(event)) => {
                for created in created_paths(event) {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    debug!(path = %created.path.display(), is_dir = created.is_dir, "created");
                    handler.on_created(created);
                }
            }
            Ok(Err(e)) => warn!("Watch error: {}", e),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                error!("Watch channel closed");
                break;
            }
        }
    }
    debug!("delivery loop exited");
}
