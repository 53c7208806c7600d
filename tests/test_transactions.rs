//! Transaction behavior through the SQL surface

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use siltdb::Engine;
use tempfile::TempDir;

fn open_engine(dir: &TempDir) -> Engine {
    Engine::open(dir.path().join("test.db"), dir.path().join("test_meta.json")).unwrap()
}

fn row_count(result: &str) -> usize {
    result
        .lines()
        .skip(2)
        .take_while(|line| !line.is_empty())
        .count()
}

#[test]
fn test_rollback_restores_pre_begin_state() {
    let dir = TempDir::new().unwrap();
    let mut engine = open_engine(&dir);

    engine
        .execute_sql("CREATE TABLE t (id INT, name TEXT)")
        .unwrap();
    engine
        .execute_sql("INSERT INTO t VALUES (1, 'a'), (2, 'b')")
        .unwrap();

    engine.execute_sql("BEGIN").unwrap();
    engine.execute_sql("INSERT INTO t VALUES (3, 'c')").unwrap();

    // Inside the transaction its own write is visible.
    let inside = engine.execute_sql("SELECT * FROM t").unwrap();
    assert_eq!(row_count(&inside), 3);

    engine.execute_sql("ROLLBACK").unwrap();
    let after = engine.execute_sql("SELECT * FROM t").unwrap();
    assert_eq!(row_count(&after), 2);
}

#[test]
fn test_rollback_reverses_update_and_delete() {
    let dir = TempDir::new().unwrap();
    let mut engine = open_engine(&dir);

    engine
        .execute_sql("CREATE TABLE t (id INT, name TEXT)")
        .unwrap();
    engine
        .execute_sql("INSERT INTO t VALUES (1, 'a'), (2, 'b')")
        .unwrap();

    engine.execute_sql("BEGIN").unwrap();
    engine
        .execute_sql("UPDATE t SET name = 'changed' WHERE id = 1")
        .unwrap();
    engine.execute_sql("DELETE FROM t WHERE id = 2").unwrap();
    engine.execute_sql("ROLLBACK").unwrap();

    let result = engine
        .execute_sql("SELECT name FROM t WHERE id = 1")
        .unwrap();
    assert!(result.contains("\na\n"));

    let result = engine.execute_sql("SELECT * FROM t").unwrap();
    assert_eq!(row_count(&result), 2);
}

#[test]
fn test_rollback_keeps_indexes_consistent() {
    let dir = TempDir::new().unwrap();
    let mut engine = open_engine(&dir);

    engine
        .execute_sql("CREATE TABLE t (id INT, name TEXT)")
        .unwrap();
    engine.execute_sql("CREATE INDEX ix ON t (id)").unwrap();
    engine.execute_sql("INSERT INTO t VALUES (1, 'a')").unwrap();

    engine.execute_sql("BEGIN").unwrap();
    engine.execute_sql("INSERT INTO t VALUES (2, 'b')").unwrap();
    engine
        .execute_sql("UPDATE t SET id = 9 WHERE id = 1")
        .unwrap();
    engine.execute_sql("ROLLBACK").unwrap();

    // Index lookups agree with the restored heap.
    let result = engine.execute_sql("SELECT * FROM t WHERE id = 1").unwrap();
    assert_eq!(row_count(&result), 1);
    let result = engine.execute_sql("SELECT * FROM t WHERE id = 2").unwrap();
    assert_eq!(row_count(&result), 0);
    let result = engine.execute_sql("SELECT * FROM t WHERE id = 9").unwrap();
    assert_eq!(row_count(&result), 0);
}

#[test]
fn test_commit_makes_writes_stick() {
    let dir = TempDir::new().unwrap();
    let mut engine = open_engine(&dir);

    engine.execute_sql("CREATE TABLE t (id INT)").unwrap();

    let started = engine.execute_sql("BEGIN").unwrap();
    assert!(started.contains("started"));
    engine.execute_sql("INSERT INTO t VALUES (1)").unwrap();
    let committed = engine.execute_sql("COMMIT").unwrap();
    assert!(committed.contains("committed"));

    let result = engine.execute_sql("SELECT * FROM t").unwrap();
    assert_eq!(row_count(&result), 1);
}

#[test]
fn test_transaction_state_errors() {
    let dir = TempDir::new().unwrap();
    let mut engine = open_engine(&dir);

    assert!(engine.execute_sql("COMMIT").is_err());
    assert!(engine.execute_sql("ROLLBACK").is_err());

    engine.execute_sql("BEGIN").unwrap();
    assert!(engine.execute_sql("BEGIN").is_err());
    engine.execute_sql("ROLLBACK").unwrap();

    // START TRANSACTION is the same statement as BEGIN.
    engine.execute_sql("START TRANSACTION").unwrap();
    engine.execute_sql("COMMIT").unwrap();
}

#[test]
fn test_writer_blocks_other_session_until_commit() {
    let dir = TempDir::new().unwrap();
    let mut engine = open_engine(&dir);

    engine.execute_sql("CREATE TABLE t (id INT)").unwrap();

    engine.execute_sql("BEGIN").unwrap();
    engine.execute_sql("INSERT INTO t VALUES (1)").unwrap();

    let mut other = engine.new_session();
    let (done_tx, done_rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let result = other.execute_sql("INSERT INTO t VALUES (2)");
        done_tx.send(()).unwrap();
        result
    });

    // The second session must still be waiting on the table lock.
    assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());

    engine.execute_sql("COMMIT").unwrap();
    handle.join().unwrap().unwrap();

    let result = engine.execute_sql("SELECT * FROM t").unwrap();
    assert_eq!(row_count(&result), 2);
}

#[test]
fn test_reader_waits_for_writer() {
    let dir = TempDir::new().unwrap();
    let mut engine = open_engine(&dir);

    engine.execute_sql("CREATE TABLE t (id INT)").unwrap();
    engine.execute_sql("BEGIN").unwrap();
    engine.execute_sql("INSERT INTO t VALUES (1)").unwrap();

    let mut other = engine.new_session();
    let (done_tx, done_rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let result = other.execute_sql("SELECT * FROM t");
        done_tx.send(()).unwrap();
        result
    });

    // Uncommitted writes stay invisible because the reader blocks.
    assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());

    engine.execute_sql("ROLLBACK").unwrap();
    let result = handle.join().unwrap().unwrap();
    assert_eq!(row_count(&result), 0);
}
