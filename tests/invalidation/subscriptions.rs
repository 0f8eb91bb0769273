//! Invalidation subscription tests
//!
//! - One callback per qualifying commit
//! - No callback for unrelated ids
//! - Cancellation before deferred dispatch

use crate::common::*;
use recstore::{Epoch, InvalidationSubscription};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn fires_exactly_once_for_one_commit() {
    let env = env();
    let log = EventLog::new();
    env.subscribe_to_invalidation_state(vec![id("user:1")], log.callback());

    let receipt = env
        .commit_update(|txn| {
            txn.invalidate_record(id("user:1"))?;
            txn.invalidate_record(id("user:2"))?;
            txn.invalidate_record(id("post:9"))
        })
        .unwrap();

    assert_eq!(log.count(), 1);
    let event = &log.events()[0];
    assert_eq!(event.epoch, receipt.epoch);
    assert_eq!(event.records.as_slice(), &[id("user:1")]);
    assert!(!event.global);
}

#[test]
fn repeated_invalidation_in_one_transaction_fires_once() {
    let env = env();
    let log = EventLog::new();
    env.subscribe_to_invalidation_state(vec![id("user:1"), id("user:2")], log.callback());

    env.commit_update(|txn| {
        txn.invalidate_record(id("user:1"))?;
        txn.invalidate_record(id("user:1"))?;
        txn.invalidate_record(id("user:2"))
    })
    .unwrap();

    assert_eq!(log.count(), 1);
    assert_eq!(log.events()[0].records.len(), 2);
}

#[test]
fn does_not_fire_for_a_different_id() {
    let env = env();
    let log = EventLog::new();
    env.subscribe_to_invalidation_state(vec![id("user:1")], log.callback());

    env.invalidate_record(id("user:2")).unwrap();
    env.commit_update(|txn| txn.set(user("user:1", "Alice")))
        .unwrap();

    assert_eq!(log.count(), 0);
}

#[test]
fn global_invalidation_fires_all_subscribers() {
    let env = env();
    let a = EventLog::new();
    let b = EventLog::new();
    env.subscribe_to_invalidation_state(vec![id("user:1")], a.callback());
    env.subscribe_to_invalidation_state(vec![id("post:1"), id("post:2")], b.callback());

    env.invalidate_store().unwrap();

    assert_eq!(a.count(), 1);
    assert_eq!(b.count(), 1);
    assert!(b.events()[0].global);
    assert!(b.events()[0].records.is_empty());
}

#[test]
fn one_callback_per_commit() {
    let env = env();
    let log = EventLog::new();
    env.subscribe_to_invalidation_state(vec![id("user:1")], log.callback());

    for _ in 0..3 {
        env.invalidate_record(id("user:1")).unwrap();
    }
    let epochs: Vec<Epoch> = log.events().iter().map(|e| e.epoch).collect();
    assert_eq!(epochs, vec![Epoch::new(1), Epoch::new(2), Epoch::new(3)]);
}

#[test]
fn every_epoch_advance_from_invalidation_notifies() {
    let env = env();
    let log = EventLog::new();
    env.subscribe_to_invalidation_state(vec![id("user:1")], log.callback());
    let before = env.capture_now(false);

    env.invalidate_record(id("user:1")).unwrap();
    env.invalidate_store().unwrap();
    let mut txn = env.begin().unwrap();
    txn.invalidate_record(id("user:1")).unwrap();
    env.commit(txn).unwrap();

    assert_eq!(env.current_epoch(), Epoch::new(3));
    assert_eq!(log.count(), 3);
    assert!(log.events()[1].global);
    assert!(env.is_stale(&before, &[id("user:1")]).is_stale());
}

#[test]
fn subscribing_to_unknown_identity_is_allowed() {
    let env = env();
    let log = EventLog::new();
    env.subscribe_to_invalidation_state(vec![id("later:1")], log.callback());

    env.commit_update(|txn| {
        txn.set(user("later:1", "Late"))?;
        txn.invalidate_record(id("later:1"))
    })
    .unwrap();
    assert_eq!(log.count(), 1);
}

// ============================================================================
// Deferred dispatch
// ============================================================================

#[test]
fn deferred_notifications_wait_for_flush() {
    let env = deferred_env();
    let log = EventLog::new();
    env.subscribe_to_invalidation_state(vec![id("user:1")], log.callback());

    env.invalidate_record(id("user:1")).unwrap();
    env.invalidate_record(id("user:1")).unwrap();
    assert_eq!(log.count(), 0);
    assert_eq!(env.stats().pending_notifications, 2);

    assert_eq!(env.flush_notifications(), 2);
    assert_eq!(log.count(), 2);
    assert_eq!(env.flush_notifications(), 0);
}

#[test]
fn unsubscribe_before_dispatch_prevents_callback() {
    let env = deferred_env();
    let log = EventLog::new();
    let handle = env.subscribe_to_invalidation_state(vec![id("user:1")], log.callback());

    env.invalidate_record(id("user:1")).unwrap();
    handle.dispose();
    env.flush_notifications();

    assert_eq!(log.count(), 0);
    assert!(!handle.is_active());
}

#[test]
fn dispose_from_inside_callback() {
    let env = env();
    let calls = Arc::new(AtomicUsize::new(0));
    let slot = Arc::new(parking_lot::Mutex::new(None::<InvalidationSubscription>));

    let handle = {
        let calls = Arc::clone(&calls);
        let slot = Arc::clone(&slot);
        env.subscribe_to_invalidation_state(vec![id("user:1")], move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = slot.lock().as_ref() {
                me.dispose();
            }
        })
    };
    *slot.lock() = Some(handle.clone());

    env.invalidate_record(id("user:1")).unwrap();
    env.invalidate_record(id("user:1")).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!handle.is_active());
}

#[test]
fn disposing_twice_is_harmless() {
    let env = env();
    let log = EventLog::new();
    let handle = env.subscribe_to_invalidation_state(vec![id("user:1")], log.callback());
    handle.dispose();
    handle.dispose();
    assert_eq!(env.stats().subscriptions, 0);
}

#[test]
fn handle_outliving_environment_is_inert() {
    let log = EventLog::new();
    let handle = {
        let env = env();
        env.subscribe_to_invalidation_state(vec![id("user:1")], log.callback())
    };
    assert!(!handle.is_active());
    handle.dispose();
}

// ============================================================================
// Properties
// ============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn callbacks_match_commits_touching_watched_ids(
            commits in proptest::collection::vec(
                proptest::collection::vec(0u8..6, 0..4),
                1..12,
            ),
        ) {
            let env = env();
            let log = EventLog::new();
            env.subscribe_to_invalidation_state(vec![id("n:0"), id("n:1")], log.callback());

            let mut expected = 0;
            for ids in &commits {
                if ids.iter().any(|n| *n < 2) {
                    expected += 1;
                }
                env.commit_update(|txn| {
                    for n in ids {
                        txn.invalidate_record(id(&format!("n:{}", n)))?;
                    }
                    Ok(())
                })
                .unwrap();
            }

            prop_assert_eq!(log.count(), expected);
            prop_assert_eq!(env.current_epoch(), Epoch::new(commits.len() as u64));
        }
    }
}
