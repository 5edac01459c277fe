//! False Positive Testing
//!
//! Everyday downloads must stay where the user put them.

use super::fixtures::*;
use dlguard::{Action, RiskScorer};

#[test]
fn test_benign_downloads_are_allowed() {
    let sandbox = Sandbox::new();
    let pipeline = sandbox.pipeline();

    for (name, expected) in benign_downloads() {
        let path = sandbox.drop_file(name, b"ordinary content");
        let record = pipeline.handle(&created(&path)).unwrap();

        assert_eq!(record.score, expected, "{} score", name);
        assert_eq!(record.action, Action::Allow, "{} action", name);
        assert!(path.exists(), "{} must not be moved", name);
        assert!(record.quarantine_path.is_none());
    }

    assert!(sandbox.quarantined_files().is_empty());
}

#[test]
fn test_no_extension_no_score() {
    let scorer = RiskScorer::new();
    let sandbox = Sandbox::new();
    let path = sandbox.drop_file("README", b"hello");

    assert_eq!(scorer.score(&path).score, 0);
}

#[test]
fn test_dotfile_is_not_an_extension() {
    let scorer = RiskScorer::new();
    let sandbox = Sandbox::new();
    let path = sandbox.drop_file(".exe", b"hello");

    // Path::extension treats a leading dot as part of the stem
    assert_eq!(scorer.score(&path).score, 0);
}

#[test]
fn test_higher_threshold_allows_small_installer() {
    let sandbox = Sandbox::new();
    let config = sandbox.config().with_threshold(70);
    let pipeline = dlguard::Pipeline::new(std::sync::Arc::new(config));

    let path = sandbox.drop_file("setup.exe", b"MZ");
    let record = pipeline.handle(&created(&path)).unwrap();

    assert_eq!(record.score, 65);
    assert_eq!(record.action, Action::Allow);
    assert!(path.exists());
}

#[test]
fn test_hash_recorded_for_allowed_files() {
    let sandbox = Sandbox::new();
    let path = sandbox.drop_file("notes.txt", b"abc");

    let record = sandbox.pipeline().handle(&created(&path)).unwrap();

    assert_eq!(
        record.content_hash,
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
