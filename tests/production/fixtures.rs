//! Shared fixtures: sandboxed directories, sample downloads and log polling.

use dlguard::monitors::CreatedPath;
use dlguard::{AgentConfig, AuditLog, EventRecord, Pipeline};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// A watch directory and a data directory, both removed on drop.
pub struct Sandbox {
    pub watch: TempDir,
    pub data: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            watch: TempDir::new().unwrap(),
            data: TempDir::new().unwrap(),
        }
    }

    /// Fast settings: short stability polls and a bounded stop.
    pub fn config(&self) -> AgentConfig {
        AgentConfig::new(self.watch.path(), self.data.path())
            .with_stability(Duration::from_millis(20), 5)
            .with_stop_timeout(Duration::from_secs(3))
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(Arc::new(self.config()))
    }

    pub fn audit(&self) -> AuditLog {
        AuditLog::new(self.config().log_path)
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.config().quarantine_dir
    }

    pub fn drop_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.watch.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn quarantined_files(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.quarantine_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Poll the audit log until it holds at least `n` records.
pub fn wait_for_records(log: &AuditLog, n: usize, timeout: Duration) -> Vec<EventRecord> {
    let deadline = Instant::now() + timeout;
    loop {
        let records = log.records();
        if records.len() >= n || Instant::now() >= deadline {
            return records;
        }
        thread::sleep(Duration::from_millis(25));
    }
}

/// A file creation as the watcher would report it.
pub fn created(path: &Path) -> CreatedPath {
    CreatedPath {
        path: path.to_path_buf(),
        is_dir: false,
    }
}

pub fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Names seen in real malicious download campaigns, with expected scores
/// for a small (under 200 KB) file.
pub fn malicious_downloads() -> Vec<(&'static str, u32)> {
    vec![
        // disguised invoice dropper: ext + double + keyword + small
        ("invoice.pdf.exe", 120),
        ("fatura_2024.pdf.scr", 120),
        // cracked software lures
        ("photoshop_crack.exe", 80),
        ("office-keygen.exe", 80),
        ("windows_activator.cmd", 80),
        // plain small installer
        ("setup.exe", 65),
        ("run.bat", 65),
        ("update.ps1", 65),
        ("shortcut.lnk", 65),
        ("payload.jar", 65),
    ]
}

/// Ordinary downloads that must never be quarantined at the default
/// threshold.
pub fn benign_downloads() -> Vec<(&'static str, u32)> {
    vec![
        ("report.txt", 0),
        ("holiday.jpg", 0),
        ("thesis.pdf", 0),
        ("archive.tar.gz", 0),
        ("budget.xlsx", 0),
        ("song.mp3", 0),
        // macro documents score but stay under 60
        ("quarterly.xlsm", 30),
        ("minutes.docm", 30),
        // macro document with a lure word
        ("invoice_march.docm", 45),
    ]
}
