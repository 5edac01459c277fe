//! Scanner modules
//!
//! Stateless file scanners: content hashing and heuristic risk scoring.

pub mod hash;
pub mod risk;

pub use hash::{sha256_file, sha256_prefix, MAX_HASH_BYTES};
pub use risk::{RiskScorer, Rule, ScanResult};
