//! Property-based tests for audit records and the log reader.

use dlguard::persistence::parse_line;
use dlguard::{Action, AuditLog, EventRecord};
use proptest::prelude::*;
use tempfile::TempDir;

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Allow), Just(Action::Quarantine), Just(Action::Error)]
}

prop_compose! {
    fn record()(
        path in "[a-zA-Z0-9 _./öçşİ-]{1,40}",
        hash in prop_oneof![Just(String::new()), "[0-9a-f]{64}"],
        score in 0u32..200,
        reasons in prop::collection::vec("[a-z :.()-]{1,30}", 0..5),
        action in action(),
        dest in prop::option::of("[a-z0-9_/.]{1,30}"),
        error in prop::option::of("[a-zA-Z0-9 :\\[\\]]{1,30}"),
    ) -> EventRecord {
        EventRecord {
            timestamp: "2024-05-01 10:00:00".to_string(),
            path,
            content_hash: hash,
            score,
            reasons,
            action,
            quarantine_path: dest,
            error,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A written record reads back equal field for field
    #[test]
    fn record_survives_the_log(records in prop::collection::vec(record(), 1..8)) {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("events.ndjson"));

        for r in &records {
            log.append(r).unwrap();
        }

        prop_assert_eq!(log.records(), records);
    }

    /// Every record is exactly one line
    #[test]
    fn serialized_record_is_single_line(r in record()) {
        let line = serde_json::to_string(&r).unwrap();
        prop_assert!(!line.contains('\n'));
        prop_assert_eq!(parse_line(&line), Some(r));
    }

    /// Truncated lines are skipped, never misparsed
    #[test]
    fn truncated_line_is_rejected(r in record(), cut in 1usize..20) {
        let line = serde_json::to_string(&r).unwrap();
        let end = line.len().saturating_sub(cut);
        let truncated: String = line.chars().take(end).collect();
        prop_assume!(truncated.len() < line.len());
        prop_assert_eq!(parse_line(&truncated), None);
    }

    /// recent_quarantines returns only quarantine records, newest first
    #[test]
    fn recent_is_filtered_and_reversed(records in prop::collection::vec(record(), 0..30), n in 0usize..12) {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("events.ndjson"));
        for r in &records {
            log.append(r).unwrap();
        }

        let expected: Vec<EventRecord> = records
            .iter()
            .rev()
            .filter(|r| r.action == Action::Quarantine)
            .take(n)
            .cloned()
            .collect();

        prop_assert_eq!(log.recent_quarantines(n), expected);
    }
}
