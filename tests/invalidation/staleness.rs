//! Expiration window behaviour

use crate::common::*;
use recstore::{CapturedAt, Epoch, OperationAvailability, StaleReason, StalenessVerdict};
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

#[test]
fn four_minutes_fresh_six_minutes_stale() {
    let (env, clock) = expiring_env(5 * MINUTE);
    env.commit_payload(op("Q"), vec![user("user:1", "Alice")], vec![id("user:1")])
        .unwrap();

    clock.advance(4 * MINUTE);
    let verdict = env.is_operation_stale(&op("Q"));
    assert_eq!(verdict, Some(StalenessVerdict::Fresh));

    clock.advance(2 * MINUTE);
    assert_eq!(
        env.is_operation_stale(&op("Q")),
        Some(StalenessVerdict::Stale(StaleReason::ExpirationElapsed))
    );
    assert_eq!(
        env.check(&op("Q")),
        OperationAvailability::Stale(StaleReason::ExpirationElapsed)
    );
}

#[test]
fn no_expiration_configured_never_expires() {
    let env = env();
    let ancient = CapturedAt::fetched(Epoch::ZERO, recstore::Timestamp::EPOCH);
    let refs = [id("user:1")];
    assert_eq!(env.is_stale(&ancient, &refs), StalenessVerdict::Fresh);
}

#[test]
fn local_commits_are_not_subject_to_expiration() {
    let (env, clock) = expiring_env(MINUTE);
    env.commit_update(|txn| {
        txn.set(user("user:1", "Alice"))?;
        txn.commit_result(op("Local"), vec![id("user:1")], false)
    })
    .unwrap();

    clock.advance(60 * MINUTE);
    assert_eq!(
        env.check(&op("Local")),
        OperationAvailability::Available { fetch_time: None }
    );

    env.invalidate_record(id("user:1")).unwrap();
    assert!(matches!(
        env.check(&op("Local")),
        OperationAvailability::Stale(StaleReason::RecordInvalidation(_))
    ));
}

#[test]
fn refetch_resets_the_window() {
    let (env, clock) = expiring_env(5 * MINUTE);
    env.commit_payload(op("Q"), vec![user("user:1", "Alice")], vec![id("user:1")])
        .unwrap();
    clock.advance(6 * MINUTE);
    assert!(!env.check(&op("Q")).is_available());

    env.commit_payload(op("Q"), vec![user("user:1", "Alice")], vec![id("user:1")])
        .unwrap();
    assert_eq!(
        env.check(&op("Q")),
        OperationAvailability::Available {
            fetch_time: Some(START.saturating_add(6 * MINUTE))
        }
    );
}

#[test]
fn invalidation_reported_before_expiration() {
    let (env, clock) = expiring_env(MINUTE);
    env.commit_payload(op("Q"), vec![user("user:1", "Alice")], vec![id("user:1")])
        .unwrap();
    env.invalidate_record(id("user:1")).unwrap();
    clock.advance(10 * MINUTE);

    assert_eq!(
        env.is_operation_stale(&op("Q")),
        Some(StalenessVerdict::Stale(StaleReason::RecordInvalidation(id(
            "user:1"
        ))))
    );
}
