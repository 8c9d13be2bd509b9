//! rollout-store — key-value backends for the rollout engine.
//!
//! The engine only needs four primitives from its backing store: get,
//! set, delete, and key enumeration by prefix. They are captured by the
//! [`KeyValueStore`] trait so the engine can run against any backend.
//!
//! # Backends
//!
//! - [`MemoryStore`]: process-local map, `Clone` handles share state.
//!   Carries an availability switch so callers can simulate an outage.
//! - [`RedbStore`]: persistent store backed by [redb](https://docs.rs/redb).
//!
//! Values are opaque bytes; the engine owns the encoding.

pub mod error;
pub mod memory;
pub mod store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::RedbStore;

/// The store collaborator consumed by the rollout engine.
///
/// Implementations must be shareable across threads. A transport or
/// backend failure is reported as a [`StoreError`]; a missing key is not
/// an error.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the raw value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Insert or overwrite the value stored under `key`.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove `key`. Returns the number of records removed (0 or 1).
    fn delete(&self, key: &str) -> StoreResult<u64>;

    /// List every key starting with `prefix`, in backend order.
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Write `value` under `key` only if the stored value equals `expected`
    /// (`None` meaning the key is absent). Returns whether the write
    /// happened.
    ///
    /// The default implementation is a plain read followed by a write and
    /// is not atomic. Backends that can check and write in one step
    /// override it.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> StoreResult<bool> {
        if self.get(key)?.as_deref() != expected {
            return Ok(false);
        }
        self.set(key, value)?;
        Ok(true)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> StoreResult<u64> {
        (**self).delete(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        (**self).keys_with_prefix(prefix)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> StoreResult<bool> {
        (**self).compare_and_swap(key, expected, value)
    }
}
