//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use parking_lot::Mutex;
use recstore::{
    Environment, EnvironmentConfig, InvalidationEvent, ManualClock, OperationId, Record,
    RecordId, Timestamp,
};
use std::sync::Arc;
use std::time::Duration;

/// Fixed start time for manual clocks
pub const START: Timestamp = Timestamp::from_secs(1_700_000_000);

pub fn id(s: &str) -> RecordId {
    RecordId::new(s)
}

pub fn op(s: &str) -> OperationId {
    OperationId::new(s)
}

pub fn user(s: &str, name: &str) -> Record {
    let mut record = Record::new(id(s), Some("User".to_string()));
    record.set_value("name", name);
    record
}

/// Route `tracing` output to the test harness; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Environment with default config and the system clock
pub fn env() -> Environment {
    Environment::new(EnvironmentConfig::default()).unwrap()
}

/// Environment with deferred dispatch
pub fn deferred_env() -> Environment {
    Environment::new(EnvironmentConfig::default().deferred()).unwrap()
}

/// Environment with an expiration window and a manual clock starting at START
pub fn expiring_env(window: Duration) -> (Environment, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let env = Environment::with_clock(EnvironmentConfig::with_expiration(window), clock.clone())
        .unwrap();
    (env, clock)
}

/// Records every event a subscription receives
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<InvalidationEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl Fn(&InvalidationEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &InvalidationEvent| events.lock().push(event.clone())
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn events(&self) -> Vec<InvalidationEvent> {
        self.events.lock().clone()
    }
}
