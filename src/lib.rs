//! dlguard - downloads folder guard
//!
//! Watches a downloads directory, waits for each new file to finish writing,
//! scores it with filename and size heuristics, moves risky files into a
//! quarantine directory and appends every decision to a JSON-lines audit log.
//!
//! The binary in main.rs wraps [`AgentController`] in a small CLI.

pub mod agent;
pub mod config;
pub mod detection;
pub mod error;
pub mod monitors;
pub mod persistence;
pub mod response;
pub mod scanner;

// Re-export commonly used types
pub use agent::AgentController;
pub use config::{AgentConfig, Config, Overrides};
pub use detection::{Action, EventRecord};
pub use error::{AgentError, Result};
pub use persistence::AuditLog;
pub use response::{Pipeline, QuarantineManager};
pub use scanner::{RiskScorer, Rule, ScanResult};
