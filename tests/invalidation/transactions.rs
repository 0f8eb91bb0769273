//! Transaction boundary tests
//!
//! - One open transaction at a time
//! - Buffered work invisible until commit
//! - Partial failure still commits completed work

use crate::common::*;
use recstore::{Epoch, Error, TransactionStatus, Value};

#[test]
fn begin_while_open_is_a_state_error() {
    let env = env();
    let txn = env.begin().unwrap();

    assert!(env.begin().unwrap_err().is_state_error());
    let err = env.invalidate_record(id("user:1")).unwrap_err();
    assert!(err.is_state_error());
    assert!(env
        .commit_update(|txn| txn.invalidate_store())
        .unwrap_err()
        .is_state_error());

    env.commit(txn).unwrap();
    assert!(env.begin().is_ok());
}

#[test]
fn writes_are_invisible_until_commit() {
    let env = env();
    let mut txn = env.begin().unwrap();
    txn.set(user("user:1", "Alice")).unwrap();
    txn.invalidate_record(id("user:1")).unwrap();

    assert!(env.lookup(&id("user:1")).is_none());
    assert_eq!(env.current_epoch(), Epoch::ZERO);
    assert_eq!(env.record_invalidated_at(&id("user:1")), None);

    let receipt = env.commit(txn).unwrap();
    assert_eq!(receipt.writes, 1);
    assert_eq!(receipt.invalidated_records, 1);
    assert!(env.lookup(&id("user:1")).is_some());
    let invalidated_at = env.record_invalidated_at(&id("user:1"));
    assert_eq!(invalidated_at, Some(receipt.epoch));
}

#[test]
fn field_updates_replace_the_record_on_commit() {
    let env = env();
    env.commit_update(|txn| txn.set(user("user:1", "Alice")))
        .unwrap();

    env.commit_update(|txn| {
        txn.set_value(&id("user:1"), "name", "Alicia")?;
        txn.set_value(&id("user:1"), "age", 31i64)?;
        txn.set_link(&id("user:1"), "manager", Some(id("user:2")))
    })
    .unwrap();

    let record = env.lookup(&id("user:1")).unwrap();
    assert_eq!(record.value("name"), Some(&Value::from("Alicia")));
    assert_eq!(record.value("age"), Some(&Value::Int(31)));
    assert_eq!(record.linked_record("manager"), Some(&id("user:2")));
}

#[test]
fn delete_removes_on_commit() {
    let env = env();
    env.commit_update(|txn| txn.set(user("user:1", "Alice")))
        .unwrap();
    env.commit_update(|txn| txn.delete(&id("user:1"))).unwrap();
    assert!(env.lookup(&id("user:1")).is_none());
}

#[test]
fn failed_update_commits_completed_work() {
    init_tracing();
    let env = env();
    let log = EventLog::new();
    env.subscribe_to_invalidation_state(vec![id("user:1")], log.callback());

    let err = env
        .commit_update(|txn| {
            txn.set(user("user:1", "Alice"))?;
            txn.invalidate_record(id("user:1"))?;
            txn.create(id("user:1"), None)
        })
        .unwrap_err();

    let Error::PartialCommit { epoch, source } = err else {
        panic!("expected PartialCommit");
    };
    assert!(matches!(*source, Error::InvalidRecord { .. }));
    assert_eq!(env.current_epoch(), epoch);
    assert!(env.lookup(&id("user:1")).is_some());
    assert_eq!(log.count(), 1);
    assert!(env.begin().is_ok());
}

#[test]
fn dropped_transaction_discards_work_and_frees_the_slot() {
    init_tracing();
    let env = env();
    {
        let mut txn = env.begin().unwrap();
        txn.set(user("user:1", "Alice")).unwrap();
        txn.invalidate_store().unwrap();
    }
    assert!(env.lookup(&id("user:1")).is_none());
    assert_eq!(env.last_global_invalidation(), None);
    assert_eq!(env.stats().transactions.aborted, 1);
    assert!(env.begin().is_ok());
}

#[test]
fn transaction_from_another_environment_is_rejected() {
    let a = env();
    let b = env();
    let txn = a.begin().unwrap();
    assert!(b.commit(txn).unwrap_err().is_state_error());
    // Rejected transaction was dropped, so `a` is idle again
    assert!(a.begin().is_ok());
}

#[test]
fn environments_do_not_share_state() {
    let a = env();
    let b = env();
    a.invalidate_store().unwrap();
    assert_eq!(a.current_epoch(), Epoch::new(1));
    assert_eq!(b.current_epoch(), Epoch::ZERO);
    assert_eq!(b.last_global_invalidation(), None);
}

#[test]
fn status_after_abort() {
    let env = env();
    let mut txn = env.begin().unwrap();
    txn.invalidate_record(id("user:1")).unwrap();
    assert_eq!(*txn.status(), TransactionStatus::Active);
    assert_eq!(txn.pending().invalidations(), 1);
    env.abort(txn, "no longer needed").unwrap();
    assert_eq!(env.current_epoch(), Epoch::ZERO);
}
