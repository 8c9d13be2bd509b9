//! Auto-degrade behaviour of guarded invocations.

use rollout_engine::{DegradeConfig, GuardError, Notifier, Rollout, RolloutError};
use rollout_engine::notify::{Channel, RecordingChannel};
use rollout_store::{KeyValueStore, MemoryStore};
use serde_json::{json, Value};

#[derive(Debug, PartialEq)]
struct Boom(u32);

fn record(store: &MemoryStore, name: &str) -> Option<Value> {
    store
        .get(&format!("rollout:{name}"))
        .unwrap()
        .map(|raw| serde_json::from_slice(&raw).unwrap())
}

/// Drive `calls` guarded invocations where every even call fails.
fn drive(rollout: &Rollout, name: &str, calls: u32) {
    for i in 0..calls {
        let _ = rollout.with_feature_flag(name, None, || {
            if i % 2 == 0 { Err(Boom(i)) } else { Ok(i) }
        });
    }
}

#[test]
fn block_runs_when_active() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store);
    rollout.activate_fully("checkout").unwrap();

    let out = rollout
        .with_feature_flag("checkout", None, || Ok::<_, Boom>("ran"))
        .unwrap();
    assert_eq!(out, Some("ran"));
}

#[test]
fn block_skipped_when_inactive() {
    let rollout = Rollout::new(MemoryStore::new());
    let mut ran = false;
    let out = rollout
        .with_feature_flag("checkout", Some("user-1"), || {
            ran = true;
            Ok::<_, Boom>(())
        })
        .unwrap();
    assert_eq!(out, None);
    assert!(!ran);
}

#[test]
fn caller_error_is_returned_unchanged() {
    let rollout = Rollout::new(MemoryStore::new());
    rollout.activate_fully("checkout").unwrap();

    let err = rollout
        .with_feature_flag("checkout", None, || Err::<(), _>(Boom(7)))
        .unwrap_err();
    assert!(!err.is_engine());
    assert_eq!(err.into_caller(), Some(Boom(7)));
}

#[test]
fn first_failure_is_counted() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone()).with_degrade(DegradeConfig::default());
    rollout.activate_fully("checkout").unwrap();

    let _ = rollout.with_feature_flag("checkout", None, || Err::<(), _>(Boom(0)));

    assert_eq!(
        record(&store, "checkout").unwrap(),
        json!({ "percentage": 100, "requests": 1, "errors": 1 })
    );
}

#[test]
fn failures_not_counted_without_degrade() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone());
    rollout.activate_fully("checkout").unwrap();

    let _ = rollout.with_feature_flag("checkout", None, || Err::<(), _>(Boom(0)));

    assert_eq!(record(&store, "checkout").unwrap(), json!({ "percentage": 100 }));
}

#[test]
fn degrades_once_threshold_is_exceeded() {
    let store = MemoryStore::new();
    let degrade = RecordingChannel::new();
    let rollout = Rollout::new(store.clone())
        .with_degrade(DegradeConfig::new(100, 0.5))
        .with_notifications(Notifier::default().on_degrade(Channel::text(degrade.clone())));
    rollout.activate_fully("checkout").unwrap();

    // Counters track every call until the last one.
    for i in 0..100u32 {
        let _ = rollout.with_feature_flag("checkout", None, || {
            if i % 2 == 0 { Err(Boom(i)) } else { Ok(i) }
        });
        let rec = record(&store, "checkout").unwrap();
        assert_eq!(rec["percentage"], 100, "degraded early at call {i}");
        assert_eq!(rec["requests"], u64::from(i) + 1);
    }

    // Call 101 fails: 51 errors > 0.5 * 101.
    let err = rollout
        .with_feature_flag("checkout", None, || Err::<(), _>(Boom(100)))
        .unwrap_err();
    assert_eq!(err.into_caller(), Some(Boom(100)));

    let rec = record(&store, "checkout").unwrap();
    assert_eq!(rec["percentage"], 0);
    assert_eq!(rec["degraded"], true);
    assert_eq!(rec["requests"], 101);
    assert_eq!(rec["errors"], 51);
    assert!(rec["degraded_at"].is_string());

    assert!(!rollout.is_active("checkout", None).unwrap());
    assert_eq!(
        degrade.texts(),
        vec!["Feature flag 'checkout' has been degraded after 101 requests and 51 errors"]
    );
}

#[test]
fn high_threshold_keeps_flag_on() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone()).with_degrade(DegradeConfig::new(100, 0.9));
    rollout.activate_fully("checkout").unwrap();

    drive(&rollout, "checkout", 101);

    let rec = record(&store, "checkout").unwrap();
    assert_eq!(
        rec,
        json!({ "percentage": 100, "requests": 101, "errors": 51 })
    );
    assert!(rollout.is_active("checkout", None).unwrap());
}

#[test]
fn no_degrade_below_min_requests() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone()).with_degrade(DegradeConfig::new(100, 0.01));
    rollout.activate_fully("checkout").unwrap();

    for _ in 0..99 {
        let _ = rollout.with_feature_flag("checkout", None, || Err::<(), _>(Boom(0)));
    }

    let rec = record(&store, "checkout").unwrap();
    assert_eq!(rec["percentage"], 100);
    assert_eq!(rec["errors"], 99);
    assert!(rec.get("degraded").is_none());
}

#[test]
fn per_flag_config_degrades_without_global_setting() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone());
    rollout
        .activate("checkout", 100, Some(DegradeConfig::new(100, 0.5)))
        .unwrap();

    drive(&rollout, "checkout", 101);

    let rec = record(&store, "checkout").unwrap();
    assert_eq!(rec["percentage"], 0);
    assert_eq!(rec["degraded"], true);
    assert_eq!(rec["degrade"], json!({ "min": 100, "threshold": 0.5 }));
}

#[test]
fn per_flag_requests_counted_on_evaluation() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone());
    rollout
        .activate("checkout", 100, Some(DegradeConfig::new(100, 0.5)))
        .unwrap();

    for _ in 0..101 {
        rollout.is_active("checkout", None).unwrap();
    }

    assert_eq!(
        record(&store, "checkout").unwrap(),
        json!({ "percentage": 100, "requests": 101, "degrade": { "min": 100, "threshold": 0.5 } })
    );
}

#[test]
fn reactivation_clears_degrade() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone()).with_degrade(DegradeConfig::new(2, 0.1));
    rollout.activate_fully("checkout").unwrap();
    for _ in 0..2 {
        let _ = rollout.with_feature_flag("checkout", None, || Err::<(), _>(Boom(0)));
    }
    assert_eq!(record(&store, "checkout").unwrap()["degraded"], true);

    rollout.activate_fully("checkout").unwrap();
    assert_eq!(record(&store, "checkout").unwrap(), json!({ "percentage": 100 }));
    assert!(rollout.is_active("checkout", None).unwrap());
}

#[test]
fn engine_error_is_not_a_caller_fault() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone()).with_degrade(DegradeConfig::default());
    rollout.activate_fully("checkout").unwrap();
    store.set_available(false);

    let mut ran = false;
    let err = rollout
        .with_feature_flag("checkout", None, || {
            ran = true;
            Ok::<_, Boom>(())
        })
        .unwrap_err();

    assert!(!ran);
    assert!(matches!(
        err,
        GuardError::Engine(RolloutError::StoreUnavailable(_))
    ));

    store.set_available(true);
    assert_eq!(record(&store, "checkout").unwrap(), json!({ "percentage": 100 }));
}

#[test]
fn failed_request_count_keeps_the_answer() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone()).with_degrade(DegradeConfig::default());
    rollout.activate_fully("checkout").unwrap();
    store.set_writable(false);

    assert!(rollout.is_active("checkout", None).unwrap());

    store.set_writable(true);
    assert_eq!(record(&store, "checkout").unwrap(), json!({ "percentage": 100 }));
}

#[test]
fn failed_error_count_still_returns_caller_error() {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone()).with_degrade(DegradeConfig::new(1, 0.1));
    rollout.activate_fully("checkout").unwrap();
    store.set_writable(false);

    let err = rollout
        .with_feature_flag("checkout", None, || Err::<(), _>(Boom(7)))
        .unwrap_err();
    assert!(matches!(err, GuardError::Caller(Boom(7))));

    store.set_writable(true);
    let rec = record(&store, "checkout").unwrap();
    assert_eq!(rec["percentage"], 100);
    assert!(rec.get("degraded").is_none());
}
