//! Monitor modules
//!
//! The downloads watcher and the write-stability gate it feeds.

pub mod downloads;
pub mod stability;

pub use downloads::{created_paths, CreatedPath, CreationHandler, FileWatcher};
pub use stability::{Stability, StabilityGate};
