//! Error kinds surfaced by the agent library.
//!
//! Per-file failures (`Hash`, `Size`, `Move`, `CopyKept`) never stop the
//! watcher: the scorer folds the first two into its result and the pipeline
//! records the last two as `action = error`. Lifecycle failures (`Start`,
//! `Stop`) go back to whoever called the controller.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("hash unavailable for {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot stat {path}: {source}")]
    Size {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to quarantine {path}: {source}")]
    Move {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Cross-device fallback copied the file but could not delete the
    /// original. Both copies exist.
    #[error("copied {path} to {dest} but could not remove the original: {source}")]
    CopyKept {
        path: PathBuf,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("audit log write to {path} failed: {source}")]
    Audit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start watcher: {0}")]
    Start(String),

    #[error("failed to stop watcher: {0}")]
    Stop(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
