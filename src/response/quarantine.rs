//! Quarantine: move a flagged file out of the watched directory.
//!
//! Destinations are `{unix_seconds}_{file_name}` inside a flat quarantine
//! directory. Same-device moves use `rename`; when the quarantine directory
//! lives on another filesystem the file is copied and the original removed.

use crate::error::{AgentError, Result};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The filesystem calls a quarantine is made of.
#[derive(Clone, Copy)]
pub(crate) struct FileOps {
    pub rename: fn(&Path, &Path) -> io::Result<()>,
    pub remove: fn(&Path) -> io::Result<()>,
}

impl fmt::Debug for FileOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileOps").finish_non_exhaustive()
    }
}

impl Default for FileOps {
    fn default() -> Self {
        Self {
            rename: |from, to| fs::rename(from, to),
            remove: |path| fs::remove_file(path),
        }
    }
}

/// Moves files into a single quarantine directory.
#[derive(Debug, Clone)]
pub struct QuarantineManager {
    dir: PathBuf,
    ops: FileOps,
}

impl QuarantineManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ops: FileOps::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_ops(mut self, ops: FileOps) -> Self {
        self.ops = ops;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Move `path` into quarantine and return where it landed.
    ///
    /// On error the original is still in place, except for
    /// [`AgentError::CopyKept`], where both copies exist.
    pub fn quarantine(&self, path: &Path) -> Result<PathBuf> {
        let move_err = |source| AgentError::Move {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(move_err)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                move_err(io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))
            })?;

        let timestamp = chrono::Utc::now().timestamp();
        let dest = self.unique_destination(timestamp, &file_name);

        match (self.ops.rename)(path, &dest) {
            Ok(()) => {}
            Err(e) if is_cross_device(&e) => {
                info!(
                    src = %path.display(),
                    dest = %dest.display(),
                    "quarantine directory is on another device, copying"
                );
                copy_then_remove(path, &dest, self.ops.remove)?;
            }
            Err(e) => return Err(move_err(e)),
        }

        info!(src = %path.display(), dest = %dest.display(), "file quarantined");
        Ok(dest)
    }

    /// First free name for this second: `{ts}_{name}`, then `{ts}-1_{name}`,
    /// `{ts}-2_{name}`, and so on.
    fn unique_destination(&self, timestamp: i64, file_name: &str) -> PathBuf {
        let first = self.dir.join(format!("{}_{}", timestamp, file_name));
        if !first.exists() {
            return first;
        }
        let mut n: u32 = 1;
        loop {
            let candidate = self.dir.join(format!("{}-{}_{}", timestamp, n, file_name));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Copy `src` to `dest`, then delete `src` with `remove`.
fn copy_then_remove(
    src: &Path,
    dest: &Path,
    remove: impl FnOnce(&Path) -> io::Result<()>,
) -> Result<()> {
    if let Err(e) = fs::copy(src, dest) {
        if dest.exists() {
            if let Err(cleanup) = fs::remove_file(dest) {
                warn!(dest = %dest.display(), error = %cleanup, "could not remove partial quarantine copy");
            }
        }
        return Err(AgentError::Move {
            path: src.to_path_buf(),
            source: e,
        });
    }

    remove(src).map_err(|source| AgentError::CopyKept {
        path: src.to_path_buf(),
        dest: dest.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(nix::libc::EXDEV)
}

#[cfg(windows)]
fn is_cross_device(e: &io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    e.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}
