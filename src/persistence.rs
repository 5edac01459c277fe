//! Append-only audit log.
//!
//! One JSON object per line. The watcher is the only writer; the GUI and the
//! `recent` command read concurrently and must cope with a half-written last
//! line, so the reader skips anything that does not parse and picks up again
//! at the next newline.

use crate::detection::{Action, EventRecord};
use crate::error::{AgentError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How far back `recent_quarantines` looks, in lines.
pub const RECENT_SCAN_WINDOW: usize = 200;

/// Read size when walking the log backwards.
const TAIL_CHUNK: u64 = 8 * 1024;

/// Audit log rooted at a single file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    /// Path to the log file
    path: PathBuf,
}

impl AuditLog {
    /// Create a log handle for the given path. Nothing is touched on disk yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one record as a single line, creating parent directories.
    ///
    /// The line is assembled in memory and handed to one `write_all`, so a
    /// reader sees either nothing or a prefix of the full line.
    pub fn append(&self, record: &EventRecord) -> Result<()> {
        let audit_err = |source| AgentError::Audit {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(audit_err)?;
        }

        let mut line = serde_json::to_vec(record)
            .map_err(|e| audit_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(audit_err)?;
        file.write_all(&line).map_err(audit_err)?;
        file.flush().map_err(audit_err)?;

        debug!(path = %record.path, action = %record.action, "audit record appended");
        Ok(())
    }

    /// Every well-formed record, oldest first. Missing file yields nothing.
    pub fn records(&self) -> Vec<EventRecord> {
        self.read_lines()
            .iter()
            .filter_map(|line| parse_line(line))
            .collect()
    }

    /// Up to `n` quarantine records, newest first, drawn from the last
    /// [`RECENT_SCAN_WINDOW`] lines.
    ///
    /// Only the tail of the file is read, so the cost does not grow with the
    /// size of the log.
    pub fn recent_quarantines(&self, n: usize) -> Vec<EventRecord> {
        if n == 0 {
            return Vec::new();
        }

        let lines = self.read_tail_lines(RECENT_SCAN_WINDOW);

        lines
            .iter()
            .rev()
            .filter_map(|line| parse_line(line))
            .filter(|record| record.action == Action::Quarantine)
            .take(n)
            .collect()
    }

    fn read_lines(&self) -> Vec<String> {
        match fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect(),
            Err(e) => {
                self.warn_unreadable(&e);
                Vec::new()
            }
        }
    }

    /// The last `max_lines` lines, oldest first.
    fn read_tail_lines(&self, max_lines: usize) -> Vec<String> {
        let (bytes, whole_file) = match File::open(&self.path).and_then(|f| read_tail(f, max_lines)) {
            Ok(tail) => tail,
            Err(e) => {
                self.warn_unreadable(&e);
                return Vec::new();
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        let mut lines: Vec<&str> = text.lines().collect();
        if !whole_file && !lines.is_empty() {
            // starts mid-line
            lines.remove(0);
        }

        let start = lines.len().saturating_sub(max_lines);
        lines[start..].iter().map(|line| line.to_string()).collect()
    }

    fn warn_unreadable(&self, e: &io::Error) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %self.path.display(), error = %e, "cannot read audit log");
        }
    }
}

/// Read backwards from the end until more than `max_lines` newlines are
/// buffered or the start is reached. Returns the bytes and whether they
/// begin at offset zero.
fn read_tail(mut file: File, max_lines: usize) -> io::Result<(Vec<u8>, bool)> {
    let mut pos = file.seek(SeekFrom::End(0))?;
    let mut buf: Vec<u8> = Vec::new();
    let mut newlines = 0usize;

    while pos > 0 && newlines <= max_lines {
        let len = TAIL_CHUNK.min(pos);
        pos -= len;
        file.seek(SeekFrom::Start(pos))?;

        let mut chunk = vec![0u8; len as usize];
        file.read_exact(&mut chunk)?;
        newlines += chunk.iter().filter(|&&b| b == b'\n').count();

        chunk.extend_from_slice(&buf);
        buf = chunk;
    }

    Ok((buf, pos == 0))
}

/// Parse one log line, `None` for blanks and fragments.
pub fn parse_line(line: &str) -> Option<EventRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line).ok()
}
