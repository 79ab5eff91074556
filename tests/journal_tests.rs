//! Journal Durability Tests
//!
//! Reopen, crash-tail and inspection behavior of the journaled accumulator
//! as seen from outside the crate.

mod common;

use batchmatch_core::{
    read_journal, JournalAccumulator, MatchResult, QueryDescriptor, ResultAccumulator,
};
use common::*;
use std::fs::OpenOptions;
use std::io::Write;

#[test]
fn entries_survive_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.journal");

    let journal = JournalAccumulator::open(&path, &test_descriptor()).unwrap();
    assert!(!journal.is_resuming());
    for id in ["rec-1", "rec-2", "rec-3"] {
        journal
            .add_result(MatchResult::new(id, 40, 2.5, vec![]))
            .unwrap();
    }
    journal.close().unwrap();

    let reopened = JournalAccumulator::open(&path, &test_descriptor()).unwrap();
    assert!(reopened.is_resuming());
    assert_eq!(reopened.n_completed(), 3);
    assert!(reopened.completed_ids().contains("rec-2"));
    assert_eq!(reopened.query_descriptor(), test_descriptor());
}

#[test]
fn crash_mid_line_loses_only_the_torn_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.journal");

    let journal = JournalAccumulator::open(&path, &test_descriptor()).unwrap();
    journal
        .add_result(MatchResult::new("rec-1", 5, 0.75, vec![]))
        .unwrap();
    journal.close().unwrap();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"rec-2\t6").unwrap();
    drop(file);

    let snapshot = read_journal(&path).unwrap().unwrap();
    assert_eq!(snapshot.entries, 1);
    assert_eq!(snapshot.discarded_lines, 1);

    let reopened = JournalAccumulator::open(&path, &test_descriptor()).unwrap();
    assert_eq!(reopened.n_completed(), 1);
    reopened
        .add_result(MatchResult::new("rec-2", 6, 0.5, vec![]))
        .unwrap();
    reopened.close().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "rec-1\t5\t0.75");
    assert_eq!(lines[2], "rec-2\t6\t0.5");
}

#[test]
fn duplicate_entries_count_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.journal");

    let journal = JournalAccumulator::open(&path, &test_descriptor()).unwrap();
    journal
        .add_result(MatchResult::new("rec-1", 5, 1.0, vec![]))
        .unwrap();
    journal
        .add_result(MatchResult::new("rec-1", 7, 1.0, vec![]))
        .unwrap();
    assert_eq!(journal.n_completed(), 1);
    journal.close().unwrap();

    let snapshot = read_journal(&path).unwrap().unwrap();
    assert_eq!(snapshot.entries, 2);
    assert_eq!(snapshot.completed_ids.len(), 1);
}

#[test]
fn reopen_keeps_stored_descriptor_even_if_caller_differs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.journal");

    JournalAccumulator::open(&path, &test_descriptor())
        .unwrap()
        .close()
        .unwrap();

    let other = test_descriptor().with("rows", 5);
    let reopened = JournalAccumulator::open(&path, &other).unwrap();
    assert_eq!(reopened.query_descriptor(), test_descriptor());
    assert_ne!(reopened.query_descriptor(), other);
}

#[test]
fn descriptor_with_empty_parameter_name_can_be_resumed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.journal");
    let descriptor = QueryDescriptor::new().with("", "x").with("rows", 1);

    let journal = JournalAccumulator::open(&path, &descriptor).unwrap();
    journal
        .add_result(MatchResult::new("rec-1", 3, 1.0, vec![]))
        .unwrap();
    journal.close().unwrap();

    let reopened = JournalAccumulator::open(&path, &descriptor).unwrap();
    assert!(reopened.is_resuming());
    assert_eq!(reopened.query_descriptor(), descriptor);
    assert_eq!(reopened.n_completed(), 1);
}
