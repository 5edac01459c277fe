//! Bounded SHA-256 content hashing.
//!
//! Only the first [`MAX_HASH_BYTES`] of a file are hashed. Larger files get a
//! digest of their prefix, which is enough to correlate repeated downloads.

use crate::error::{AgentError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Hashing stops after this many bytes.
pub const MAX_HASH_BYTES: u64 = 50_000_000;

/// Read size per iteration.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Hex SHA-256 of at most `max_bytes` leading bytes of `path`.
pub fn sha256_prefix(path: &Path, max_bytes: u64) -> Result<String> {
    let hash_err = |source| AgentError::Hash {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(hash_err)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut remaining = max_bytes;

    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let read = match file.read(&mut buffer[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(hash_err(e)),
        };
        hasher.update(&buffer[..read]);
        remaining -= read as u64;
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 with the default cap.
pub fn sha256_file(path: &Path) -> Result<String> {
    sha256_prefix(path, MAX_HASH_BYTES)
}
