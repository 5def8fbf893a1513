//! Cross-module invariants against `failinj-core`'s public engine API.
//!
//! One `tests/*_test.rs` file per concern; the invariants here are the
//! ∀-quantified properties each component's own unit tests only cover in
//! isolation.

use failinj_core::tracker::Resource;
use failinj_harness::fixtures::fresh_engine;

#[test]
fn injection_appends_exactly_one_record_matching_the_callsite_table() {
    let dir = tempfile::tempdir().unwrap();
    let engine = fresh_engine(dir.path(), "db");

    assert!(engine.should_inject().unwrap());

    let mut db = failinj_core::database::Database::open(&dir.path().join("db")).unwrap();
    let records = db.load().unwrap();
    assert_eq!(records.len(), 1, "exactly one record must be appended");

    // Replaying the same call site against a fresh engine over the same
    // database must see it as already known: the record written is this
    // call site's fingerprint, by construction of `should_inject`.
    let engine2 = fresh_engine(dir.path(), "db");
    assert!(!engine2.should_inject().unwrap());
}

#[test]
fn run_with_no_new_callsites_leaves_callsite_table_equal_to_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db");

    {
        let engine = fresh_engine(dir.path(), "db");
        assert!(engine.should_inject().unwrap());
    }

    // A fresh engine over the same database must load it, but since the
    // call site that created it is no longer novel once latched, a second
    // engine still sees it as known and does not grow the database.
    let engine2 = fresh_engine(dir.path(), "db");
    assert!(!engine2.should_inject().unwrap());

    let mut db = failinj_core::database::Database::open(&db_path).unwrap();
    assert_eq!(db.load().unwrap().len(), 1, "no new injection, no growth");
}

#[test]
fn resource_present_at_shutdown_produces_exactly_one_leak_report() {
    let dir = tempfile::tempdir().unwrap();
    let engine = fresh_engine(dir.path(), "db");

    engine.track_create(Resource::Descriptor, 7);
    assert!(!engine.bug_found());

    engine.scan_leaks_and_drain();
    assert!(engine.bug_found(), "surviving resource must be reported as a leak");

    // Draining is destructive: a second scan over the same engine finds
    // nothing left to report.
    let engine_bug_before_second_scan = engine.bug_found();
    engine.scan_leaks_and_drain();
    assert_eq!(engine.bug_found(), engine_bug_before_second_scan);
}

#[test]
fn destroy_of_absent_key_produces_exactly_one_untracked_release_report() {
    let dir = tempfile::tempdir().unwrap();
    let engine = fresh_engine(dir.path(), "db");

    let filter = engine.config.untracked_frees.clone();
    engine.track_destroy(Resource::Allocation, 0xdead, &filter, "Attempted to free untracked pointer");

    assert!(engine.bug_found());
}

#[test]
fn skip_injection_substring_match_never_injects() {
    let dir = tempfile::tempdir().unwrap();
    let engine = failinj_harness::fixtures::engine_with_skip(
        dir.path(),
        "db",
        &["skip_injection_substring_match_never_injects"],
    );

    assert!(!engine.should_inject().unwrap());

    let mut db = failinj_core::database::Database::open(&dir.path().join("db")).unwrap();
    assert!(db.load().unwrap().is_empty());
}

#[test]
fn fingerprint_is_deterministic_for_the_same_call_site() {
    let first = match failinj_core::fingerprint::fingerprint(&[]) {
        failinj_core::fingerprint::Fingerprint::Hash(h) => h,
        failinj_core::fingerprint::Fingerprint::Skip => panic!("not skipped"),
    };
    let second = match failinj_core::fingerprint::fingerprint(&[]) {
        failinj_core::fingerprint::Fingerprint::Hash(h) => h,
        failinj_core::fingerprint::Fingerprint::Skip => panic!("not skipped"),
    };
    assert_eq!(first, second);
}
