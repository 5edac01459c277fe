//! Heuristic risk scoring for newly downloaded files.
//!
//! Each rule looks at one trait of the file (extension, name, size, hash
//! availability) and contributes a fixed number of points. Rules are
//! independent: every rule whose condition holds fires exactly once, and no
//! rule cancels another.

use super::hash::{sha256_prefix, MAX_HASH_BYTES};
use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Executables and scripts Windows will run on double-click.
pub const EXECUTABLE_EXTENSIONS: &[&str] = &[
    "exe", "msi", "bat", "cmd", "ps1", "vbs", "js", "jar", "scr", "lnk",
];

/// Office formats that can carry VBA macros.
pub const MACRO_EXTENSIONS: &[&str] = &["docm", "xlsm", "pptm"];

/// Final suffixes that make `name.doc.<suffix>` a disguise.
pub const DOUBLE_EXTENSION_TARGETS: &[&str] = &["exe", "bat", "cmd", "ps1", "js", "vbs", "scr"];

/// Lures common in cracked-software and fake-invoice campaigns, including
/// Turkish invoice/quote/payment terms.
pub const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "crack", "keygen", "activator", "patch", "loader", "invoice", "fatura", "teklif", "odeme",
    "ödeme",
];

/// Executables below this size are treated as possible droppers.
pub const SMALL_EXECUTABLE_BYTES: u64 = 200_000;

/// A single scoring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    ExecutableExtension,
    MacroDocument,
    DoubleExtension,
    SuspiciousName,
    SmallExecutable,
    HashUnavailable,
}

impl Rule {
    pub const ALL: [Rule; 6] = [
        Rule::ExecutableExtension,
        Rule::MacroDocument,
        Rule::DoubleExtension,
        Rule::SuspiciousName,
        Rule::SmallExecutable,
        Rule::HashUnavailable,
    ];

    pub fn points(self) -> u32 {
        match self {
            Rule::ExecutableExtension => 50,
            Rule::MacroDocument => 30,
            Rule::DoubleExtension => 40,
            Rule::SuspiciousName => 15,
            Rule::SmallExecutable => 15,
            Rule::HashUnavailable => 10,
        }
    }
}

/// Outcome of scoring one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub path: PathBuf,
    /// Hex SHA-256, empty when the file could not be read.
    pub content_hash: String,
    pub score: u32,
    /// Human-readable explanation, one entry per fired rule, in firing order.
    pub reasons: Vec<String>,
    /// Fired rules, parallel to `reasons`.
    pub rules: Vec<Rule>,
}

impl ScanResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            content_hash: String::new(),
            score: 0,
            reasons: Vec::new(),
            rules: Vec::new(),
        }
    }

    fn fire(&mut self, rule: Rule, reason: impl Into<String>) {
        self.score += rule.points();
        self.rules.push(rule);
        self.reasons.push(reason.into());
    }

    pub fn fired(&self, rule: Rule) -> bool {
        self.rules.contains(&rule)
    }
}

/// Stateless scorer. Holds only the hashing cap.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    max_hash_bytes: u64,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskScorer {
    pub fn new() -> Self {
        Self {
            max_hash_bytes: MAX_HASH_BYTES,
        }
    }

    /// Override the hashing cap.
    pub fn with_hash_limit(mut self, max_bytes: u64) -> Self {
        self.max_hash_bytes = max_bytes;
        self
    }

    /// Score `path`. Never fails; I/O problems become reasons or are ignored.
    pub fn score(&self, path: &Path) -> ScanResult {
        let mut result = ScanResult::new(path);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let executable = EXECUTABLE_EXTENSIONS.contains(&ext.as_str());

        if executable {
            result.fire(Rule::ExecutableExtension, format!("executable/script extension: .{}", ext));
        }

        if MACRO_EXTENSIONS.contains(&ext.as_str()) {
            result.fire(Rule::MacroDocument, format!("macro-enabled office document: .{}", ext));
        }

        if has_double_extension(&name) {
            result.fire(Rule::DoubleExtension, "double extension (e.g. pdf.exe)");
        }

        if let Some(keyword) = suspicious_keyword(&name) {
            result.fire(
                Rule::SuspiciousName,
                format!("suspicious filename pattern: {}", keyword),
            );
        }

        match file_size(path) {
            Ok(size) => {
                if executable && size < SMALL_EXECUTABLE_BYTES {
                    result.fire(Rule::SmallExecutable, "very small executable (possible dropper)");
                }
            }
            Err(e) => debug!(error = %e, "size unavailable, skipping size rule"),
        }

        match sha256_prefix(path, self.max_hash_bytes) {
            Ok(hash) => result.content_hash = hash,
            Err(AgentError::Hash { source, .. }) => {
                result.fire(Rule::HashUnavailable, format!("hash unavailable: {}", source));
            }
            Err(e) => {
                result.fire(Rule::HashUnavailable, format!("hash unavailable: {}", e));
            }
        }

        result
    }
}

/// `name` has two or more dot-separated suffixes and the last one runs code.
/// Expects a lowercased file name.
pub fn has_double_extension(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() >= 3
        && parts
            .last()
            .map(|last| DOUBLE_EXTENSION_TARGETS.contains(last))
            .unwrap_or(false)
}

/// First lure keyword contained in a lowercased file name.
pub fn suspicious_keyword(name: &str) -> Option<&'static str> {
    SUSPICIOUS_KEYWORDS.iter().copied().find(|k| name.contains(k))
}

fn file_size(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| AgentError::Size {
            path: path.to_path_buf(),
            source,
        })
}
