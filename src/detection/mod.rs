//! Common types for scan decisions and their audit records.

use crate::scanner::ScanResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Audit timestamp layout, local time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn now_ts() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// What the agent did with an observed file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Quarantine,
    Error,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Quarantine => write!(f, "quarantine"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One line of the audit log. Written once per observed file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    #[serde(rename = "ts")]
    pub timestamp: String,
    pub path: String,
    /// Hex SHA-256, empty when hashing failed.
    #[serde(rename = "sha256", default)]
    pub content_hash: String,
    pub score: u32,
    #[serde(default)]
    pub reasons: Vec<String>,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantine_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventRecord {
    /// An `allow` record carrying the scan outcome, stamped now.
    pub fn from_scan(scan: ScanResult) -> Self {
        Self {
            timestamp: now_ts(),
            path: scan.path.display().to_string(),
            content_hash: scan.content_hash,
            score: scan.score,
            reasons: scan.reasons,
            action: Action::Allow,
            quarantine_path: None,
            error: None,
        }
    }

    /// Record for a file whose processing failed before a scan result existed.
    pub fn failed(path: &Path, error: impl Into<String>) -> Self {
        Self {
            timestamp: now_ts(),
            path: path.display().to_string(),
            content_hash: String::new(),
            score: 0,
            reasons: Vec::new(),
            action: Action::Error,
            quarantine_path: None,
            error: Some(error.into()),
        }
    }

    pub fn quarantined(mut self, dest: &Path) -> Self {
        self.action = Action::Quarantine;
        self.quarantine_path = Some(dest.display().to_string());
        self.error = None;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.action = Action::Error;
        self.error = Some(error.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}
