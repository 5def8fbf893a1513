//! Round-trip / idempotence properties.

use failinj_harness::fixtures::fresh_engine;

#[test]
fn loading_database_then_shutting_down_with_no_calls_is_bit_identical() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db");

    // Seed a database with a couple of prior records, the way a real prior
    // run would have left it.
    {
        let mut db = failinj_core::database::Database::open(&db_path).unwrap();
        db.append(111).unwrap();
        db.append(222).unwrap();
    }
    let before = std::fs::read(&db_path).unwrap();

    // A fresh engine that never intercepts anything and only runs its
    // shutdown scan must not touch the database file at all.
    let engine = fresh_engine(dir.path(), "db");
    engine.scan_leaks_and_drain();

    let after = std::fs::read(&db_path).unwrap();
    assert_eq!(before, after, "idle shutdown must leave the database untouched");
}

#[test]
fn second_run_over_a_known_callsite_does_not_reinject_or_grow_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db");

    {
        let engine = fresh_engine(dir.path(), "db");
        assert!(engine.should_inject().unwrap(), "first run over a fresh database must inject once");
    }

    let before = std::fs::read(&db_path).unwrap();

    let engine2 = fresh_engine(dir.path(), "db");
    assert!(
        !engine2.should_inject().unwrap(),
        "second run whose call site is already recorded must not inject"
    );

    let after = std::fs::read(&db_path).unwrap();
    assert_eq!(before, after, "database must not grow on a known call site");
}
