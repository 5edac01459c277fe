//! Integration Tests
//!
//! The controller driving a live native watcher on a temporary directory.
//! Results are observed through the audit log, the same way the `recent`
//! command and any UI read them.

use super::fixtures::*;
use dlguard::{Action, AgentController, AgentError};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

#[test]
fn test_live_agent_quarantines_and_allows() {
    let sandbox = Sandbox::new();
    let agent = AgentController::new(sandbox.config());
    agent.start().unwrap();

    let exe = sandbox.drop_file("setup.exe", b"MZ\x90\x00");
    let txt = sandbox.drop_file("report.txt", b"numbers");

    let records = wait_for_records(&sandbox.audit(), 2, WAIT);
    agent.stop().unwrap();

    assert_eq!(records.len(), 2);
    let by_name = |n: &str| records.iter().find(|r| file_name(&r.path) == n).unwrap().clone();

    let exe_record = by_name("setup.exe");
    assert_eq!(exe_record.action, Action::Quarantine);
    assert_eq!(exe_record.score, 65);
    assert!(!exe.exists());

    let txt_record = by_name("report.txt");
    assert_eq!(txt_record.action, Action::Allow);
    assert!(txt.exists());

    let recent = agent.recent_quarantines(10);
    assert_eq!(recent.len(), 1);
    assert_eq!(file_name(&recent[0].path), "setup.exe");
}

#[test]
fn test_double_start_delivers_once() {
    let sandbox = Sandbox::new();
    let agent = AgentController::new(sandbox.config());
    agent.start().unwrap();
    agent.start().unwrap();

    sandbox.drop_file("notes.txt", b"hello");
    let records = wait_for_records(&sandbox.audit(), 1, WAIT);
    assert_eq!(records.len(), 1);

    // give a duplicate subscription time to show up
    thread::sleep(Duration::from_millis(500));
    agent.stop().unwrap();

    assert_eq!(sandbox.audit().records().len(), 1);
}

#[test]
fn test_transient_files_never_audited() {
    let sandbox = Sandbox::new();
    let agent = AgentController::new(sandbox.config());
    agent.start().unwrap();

    let partial = sandbox.drop_file("movie.mkv.part", b"partial");
    sandbox.drop_file("tmpfile.tmp", b"scratch");
    sandbox.drop_file("done.txt", b"finished");

    let records = wait_for_records(&sandbox.audit(), 1, WAIT);
    thread::sleep(Duration::from_millis(300));
    agent.stop().unwrap();

    let records_after = sandbox.audit().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records_after.len(), 1);
    assert_eq!(file_name(&records_after[0].path), "done.txt");
    assert!(partial.exists());
}

#[test]
fn test_subdirectory_creation_ignored() {
    let sandbox = Sandbox::new();
    let agent = AgentController::new(sandbox.config());
    agent.start().unwrap();

    fs::create_dir(sandbox.watch.path().join("extracted.exe")).unwrap();
    sandbox.drop_file("after.txt", b"x");

    let records = wait_for_records(&sandbox.audit(), 1, WAIT);
    thread::sleep(Duration::from_millis(300));
    agent.stop().unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(sandbox.audit().records().len(), 1);
    assert_eq!(file_name(&records[0].path), "after.txt");
}

#[test]
fn test_nothing_processed_after_stop() {
    let sandbox = Sandbox::new();
    let agent = AgentController::new(sandbox.config());
    agent.start().unwrap();
    agent.stop().unwrap();
    agent.stop().unwrap();
    assert!(!agent.is_running());

    let exe = sandbox.drop_file("late.exe", b"MZ");
    thread::sleep(Duration::from_millis(500));

    assert!(exe.exists());
    assert!(!sandbox.audit().exists());
}

#[test]
fn test_existing_files_not_scanned_on_start() {
    let sandbox = Sandbox::new();
    let old = sandbox.drop_file("old_setup.exe", b"MZ");

    let agent = AgentController::new(sandbox.config());
    agent.start().unwrap();
    thread::sleep(Duration::from_millis(500));
    agent.stop().unwrap();

    assert!(old.exists());
    assert!(!sandbox.audit().exists());
}

#[test]
fn test_missing_watch_dir_is_start_error() {
    let sandbox = Sandbox::new();
    let config = dlguard::AgentConfig::new(sandbox.watch.path().join("missing"), sandbox.data.path());
    let agent = AgentController::new(config);

    let err = agent.start().unwrap_err();
    assert!(matches!(err, AgentError::Start(_)));
    assert!(!agent.is_running());
}

#[test]
fn test_concurrent_start_stop_settles() {
    let sandbox = Sandbox::new();
    let agent = Arc::new(AgentController::new(sandbox.config()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let agent = Arc::clone(&agent);
            thread::spawn(move || {
                if i % 2 == 0 {
                    agent.start().unwrap();
                } else {
                    agent.stop().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // whatever the interleaving, one more start leaves exactly one watcher
    agent.start().unwrap();
    assert!(agent.is_running());
    sandbox.drop_file("canary.txt", b"canary");
    let records = wait_for_records(&sandbox.audit(), 1, WAIT);
    thread::sleep(Duration::from_millis(300));
    agent.stop().unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(sandbox.audit().records().len(), 1);
}
