//! Cache fallback while the backing store is unreachable.

use std::thread;
use std::time::Duration;

use rollout_engine::{CacheConfig, Rollout, RolloutError};
use rollout_store::{KeyValueStore, MemoryStore};

fn cached_engine(ttl: Duration) -> (MemoryStore, Rollout) {
    let store = MemoryStore::new();
    let rollout = Rollout::new(store.clone()).with_cache(CacheConfig::with_ttl(ttl));
    (store, rollout)
}

#[test]
fn serves_last_decision_while_store_is_down() {
    let (store, rollout) = cached_engine(Duration::from_secs(300));
    rollout.activate_fully("search").unwrap();
    assert!(rollout.is_active("search", None).unwrap());

    store.set_available(false);
    assert!(rollout.is_active("search", None).unwrap());
    assert!(rollout.is_active("search", None).unwrap());
}

#[test]
fn fails_once_the_entry_expires() {
    let (store, rollout) = cached_engine(Duration::from_millis(50));
    rollout.activate_fully("search").unwrap();
    assert!(rollout.is_active("search", None).unwrap());

    store.set_available(false);
    assert!(rollout.is_active("search", None).unwrap());

    thread::sleep(Duration::from_millis(80));
    let err = rollout.is_active("search", None).unwrap_err();
    assert!(matches!(err, RolloutError::StoreUnavailable(_)));
}

#[test]
fn cache_is_not_consulted_on_the_happy_path() {
    let (store, rollout) = cached_engine(Duration::from_secs(300));
    rollout.activate_fully("search").unwrap();

    // Another writer turns the flag off behind the engine's back.
    store.set("rollout:search", br#"{"percentage":0}"#).unwrap();
    assert!(!rollout.is_active("search", None).unwrap());
}

#[test]
fn uncached_flag_fails_during_outage() {
    let (store, rollout) = cached_engine(Duration::from_secs(300));
    store.set_available(false);

    let err = rollout.is_active("never-seen", None).unwrap_err();
    assert!(matches!(err, RolloutError::StoreUnavailable(_)));
}

#[test]
fn clean_cache_drops_the_fallback() {
    let (store, rollout) = cached_engine(Duration::from_secs(300));
    rollout.activate_fully("search").unwrap();
    rollout.clean_cache();

    store.set_available(false);
    assert!(rollout.is_active("search", None).is_err());
}

#[test]
fn deactivate_evicts_cached_entry() {
    let (store, rollout) = cached_engine(Duration::from_secs(300));
    rollout.activate_fully("search").unwrap();
    rollout.deactivate("search").unwrap();

    store.set_available(false);
    assert!(rollout.is_active("search", None).is_err());
}

#[test]
fn clean_cache_without_cache_is_a_no_op() {
    let rollout = Rollout::new(MemoryStore::new());
    rollout.clean_cache();
    assert!(rollout.cache().is_none());
}
