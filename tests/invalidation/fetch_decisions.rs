//! Fetch policy decisions against the cache

use crate::common::*;
use recstore::{FetchPolicy, OperationAvailability, StaleReason};
use std::time::Duration;

#[test]
fn fresh_result_served_from_cache() {
    let env = env();
    env.commit_payload(op("Q"), vec![user("user:1", "Alice")], vec![id("user:1")])
        .unwrap();

    let decision = env.decide(&op("Q"), FetchPolicy::StoreOrNetwork);
    assert!(decision.serve_from_cache);
    assert!(!decision.network_request);
}

#[test]
fn stale_result_goes_to_network() {
    let env = env();
    env.commit_payload(op("Q"), vec![user("user:1", "Alice")], vec![id("user:1")])
        .unwrap();
    env.invalidate_record(id("user:1")).unwrap();

    let decision = env.decide(&op("Q"), FetchPolicy::StoreOrNetwork);
    assert!(!decision.serve_from_cache);
    assert!(decision.network_request);
    assert_eq!(
        decision.availability,
        OperationAvailability::Stale(StaleReason::RecordInvalidation(id("user:1")))
    );

    let decision = env.decide(&op("Q"), FetchPolicy::StoreAndNetwork);
    assert!(decision.serve_from_cache);
    assert!(decision.network_request);
}

#[test]
fn unknown_operation_is_missing() {
    let env = env();
    let decision = env.decide(&op("Never"), FetchPolicy::StoreOnly);
    assert_eq!(decision.availability, OperationAvailability::Missing);
    assert!(!decision.serve_from_cache);
    assert!(!decision.network_request);
}

#[test]
fn deleted_reference_is_missing() {
    let env = env();
    env.commit_payload(
        op("Q"),
        vec![user("user:1", "Alice"), user("user:2", "Bob")],
        vec![id("user:1"), id("user:2")],
    )
    .unwrap();
    env.commit_update(|txn| txn.delete(&id("user:2"))).unwrap();

    assert_eq!(env.check(&op("Q")), OperationAvailability::Missing);
    let decision = env.decide(&op("Q"), FetchPolicy::StoreOrNetwork);
    assert!(decision.network_request);
}

#[test]
fn expired_result_refetched_under_default_policy() {
    let (env, clock) = expiring_env(Duration::from_secs(30));
    env.commit_payload(op("Q"), vec![user("user:1", "Alice")], vec![id("user:1")])
        .unwrap();
    clock.advance(Duration::from_secs(31));

    let decision = env.decide(&op("Q"), FetchPolicy::default());
    assert!(decision.network_request);
    assert!(!decision.serve_from_cache);

    let decision = env.decide(&op("Q"), FetchPolicy::NetworkOnly);
    assert!(decision.network_request);
}
