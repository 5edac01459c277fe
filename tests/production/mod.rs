//! End-to-end tests for dlguard
//!
//! Test Categories:
//! 1. Scenarios - risky downloads that must be quarantined
//! 2. Evasion - disguised names and casing tricks
//! 3. False Positives - ordinary downloads that must be left alone
//! 4. Integration - the controller driving a live watcher

pub mod fixtures;
pub mod false_positives;
pub mod integration;
