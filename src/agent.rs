//! Start/stop controller around one downloads watcher.

use crate::config::AgentConfig;
use crate::detection::EventRecord;
use crate::error::Result;
use crate::monitors::FileWatcher;
use crate::persistence::AuditLog;
use crate::response::Pipeline;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Owns at most one running watcher.
///
/// `start` and `stop` are idempotent and may be called from any thread.
/// Both hold the same lock for their whole duration, so a second `start`
/// racing the first sees the watcher and returns without subscribing again.
pub struct AgentController {
    config: Arc<AgentConfig>,
    watcher: Mutex<Option<FileWatcher>>,
    running: AtomicBool,
    audit: AuditLog,
}

impl AgentController {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            audit: AuditLog::new(&config.log_path),
            config: Arc::new(config),
            watcher: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Subscribe to the watch directory. No-op when already running.
    ///
    /// On error the controller stays stopped.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.lock();
        if slot.is_some() {
            debug!("start requested while running");
            return Ok(());
        }

        let pipeline = Pipeline::new(Arc::clone(&self.config));
        let watcher = FileWatcher::spawn(&self.config.watch_dir, self.config.backend, pipeline)?;

        *slot = Some(watcher);
        self.running.store(true, Ordering::SeqCst);
        info!(
            watch_dir = %self.config.watch_dir.display(),
            threshold = self.config.threshold,
            "agent started"
        );
        Ok(())
    }

    /// Unsubscribe and wait (bounded) for the in-flight file. No-op when
    /// already stopped.
    ///
    /// Always ends Stopped. An `AgentError::Stop` means the watcher thread
    /// had already died; there is nothing left to keep running.
    pub fn stop(&self) -> Result<()> {
        let mut slot = self.lock();
        let mut watcher = match slot.take() {
            Some(watcher) => watcher,
            None => {
                debug!("stop requested while stopped");
                return Ok(());
            }
        };

        let result = watcher.stop(self.config.stop_timeout);
        self.running.store(false, Ordering::SeqCst);
        info!("agent stopped");
        result
    }

    /// Never blocks on a concurrent `start` or `stop`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Newest-first quarantine records from the audit log.
    pub fn recent_quarantines(&self, n: usize) -> Vec<EventRecord> {
        self.audit.recent_quarantines(n)
    }

    fn lock(&self) -> MutexGuard<'_, Option<FileWatcher>> {
        self.watcher.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for AgentController {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
