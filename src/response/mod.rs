//! Response pipeline: wait, score, act, record.

pub mod quarantine;

pub use quarantine::QuarantineManager;

use crate::config::AgentConfig;
use crate::detection::{Action, EventRecord};
use crate::monitors::{CreatedPath, CreationHandler, StabilityGate};
use crate::persistence::AuditLog;
use crate::scanner::{RiskScorer, ScanResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Processes one created file at a time on behalf of the watcher.
pub struct Pipeline {
    config: Arc<AgentConfig>,
    gate: StabilityGate,
    scorer: RiskScorer,
    quarantine: QuarantineManager,
    audit: AuditLog,
}

impl Pipeline {
    pub fn new(config: Arc<AgentConfig>) -> Self {
        Self {
            gate: StabilityGate::new(config.stability),
            scorer: RiskScorer::new(),
            quarantine: QuarantineManager::new(&config.quarantine_dir),
            audit: AuditLog::new(&config.log_path),
            config,
        }
    }

    pub fn with_scorer(mut self, scorer: RiskScorer) -> Self {
        self.scorer = scorer;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_quarantine(mut self, quarantine: QuarantineManager) -> Self {
        self.quarantine = quarantine;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// The action a score maps to, before anything is done about it.
    pub fn verdict(&self, scan: &ScanResult) -> Action {
        if scan.score >= self.config.threshold {
            Action::Quarantine
        } else {
            Action::Allow
        }
    }

    /// Score `path` without waiting or acting.
    pub fn evaluate(&self, path: &Path) -> (ScanResult, Action) {
        let scan = self.scorer.score(path);
        let verdict = self.verdict(&scan);
        (scan, verdict)
    }

    /// Wait for the file to settle, score it, and quarantine it if the
    /// score reaches the threshold. Nothing is written to the audit log.
    pub fn process(&self, path: &Path) -> EventRecord {
        let stability = self.gate.wait_stable(path);
        if !stability.is_stable() {
            debug!(path = %path.display(), outcome = ?stability, "scanning unsettled file");
        }

        let (scan, verdict) = self.evaluate(path);
        let record = EventRecord::from_scan(scan);

        if verdict == Action::Allow {
            return record;
        }

        match self.quarantine.quarantine(path) {
            Ok(dest) => {
                warn!(
                    path = %path.display(),
                    score = record.score,
                    threshold = self.config.threshold,
                    dest = %dest.display(),
                    "risky file quarantined"
                );
                record.quarantined(&dest)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "quarantine failed");
                record.with_error(e.to_string())
            }
        }
    }

    /// Full handling of one creation event: filter, process, record.
    ///
    /// Returns `None` for directories and in-progress downloads. A panic
    /// during processing becomes an `error` record instead of killing the
    /// watcher thread.
    pub fn handle(&self, event: &CreatedPath) -> Option<EventRecord> {
        if event.is_dir {
            return None;
        }
        if self.config.is_transient(&event.path) {
            debug!(path = %event.path.display(), "skipping in-progress download");
            return None;
        }

        let record = panic::catch_unwind(AssertUnwindSafe(|| self.process(&event.path)))
            .unwrap_or_else(|payload| {
                let msg = panic_message(payload.as_ref());
                error!(path = %event.path.display(), panic = %msg, "file processing panicked");
                EventRecord::failed(&event.path, format!("internal error: {}", msg))
            });

        if let Err(e) = self.audit.append(&record) {
            error!(error = %e, "audit write failed");
        }

        info!(
            path = %record.path,
            score = record.score,
            action = %record.action,
            "file processed"
        );
        Some(record)
    }
}

impl CreationHandler for Pipeline {
    fn on_created(&mut self, event: CreatedPath) {
        self.handle(&event);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
