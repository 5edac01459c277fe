//! Write-stability gate.
//!
//! Browsers stream downloads in chunks, so a file shows up long before its
//! last byte lands. Scanning too early hashes a prefix and can trip the
//! small-executable rule. The gate polls the size and releases the file once
//! two consecutive polls agree on a non-zero size, or once the attempt budget
//! runs out. Exhausting the budget is not an error: the caller scans whatever
//! is there.

use crate::config::StabilityConfig;
use std::fs;
use std::path::Path;
use std::thread;
use tracing::trace;

/// How the wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Size held steady across two polls.
    Stable { size: u64 },
    /// Budget exhausted. `last_size` is the final successful reading.
    TimedOut { last_size: Option<u64> },
}

impl Stability {
    pub fn is_stable(&self) -> bool {
        matches!(self, Stability::Stable { .. })
    }
}

#[derive(Debug, Clone)]
pub struct StabilityGate {
    config: StabilityConfig,
}

impl StabilityGate {
    pub fn new(config: StabilityConfig) -> Self {
        Self { config }
    }

    /// Block until `path` looks fully written or the budget is spent.
    ///
    /// Not cancellable: once started, the wait runs to one of its two ends.
    /// A file that stays at zero bytes always ends in `TimedOut`.
    pub fn wait_stable(&self, path: &Path) -> Stability {
        let mut last: Option<u64> = None;

        for attempt in 0..self.config.max_attempts {
            match fs::metadata(path) {
                Ok(meta) => {
                    let size = meta.len();
                    if last == Some(size) && size > 0 {
                        trace!(path = %path.display(), size, attempt, "file stable");
                        return Stability::Stable { size };
                    }
                    last = Some(size);
                }
                Err(e) => {
                    trace!(path = %path.display(), error = %e, attempt, "stat failed while waiting");
                }
            }
            thread::sleep(self.config.interval);
        }

        Stability::TimedOut { last_size: last }
    }
}
