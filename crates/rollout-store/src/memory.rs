//! In-memory store with a simulated-outage switch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::KeyValueStore;

/// Process-local key-value store.
///
/// Cloning is cheap and every clone sees the same data, so a test can keep
/// a handle for seeding records or toggling availability while the engine
/// owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Set while the store is simulating a connection failure.
    down: AtomicBool,
    /// Set while writes fail but reads still succeed.
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with [`StoreError::Unavailable`]
    /// (`false`) or succeed again (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.down.store(!available, Ordering::SeqCst);
        debug!(available, "memory store availability changed");
    }

    pub fn is_available(&self) -> bool {
        !self.inner.down.load(Ordering::SeqCst)
    }

    /// Make every subsequent write (`set`, `delete`, `compare_and_swap`) fail
    /// with [`StoreError::Unavailable`] while reads keep working.
    pub fn set_writable(&self, writable: bool) {
        self.inner.read_only.store(!writable, Ordering::SeqCst);
        debug!(writable, "memory store writability changed");
    }

    pub fn is_writable(&self) -> bool {
        !self.inner.read_only.load(Ordering::SeqCst)
    }

    /// Number of stored keys across every namespace.
    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        if !self.is_available() {
            return Err(StoreError::Unavailable(
                "memory store is marked unavailable".to_string(),
            ));
        }
        self.inner
            .entries
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn writable_entries(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        if !self.is_writable() {
            return Err(StoreError::Unavailable(
                "memory store is marked read-only".to_string(),
            ));
        }
        self.entries()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.writable_entries()?.insert(key.to_string(), value.to_vec());
        debug!(%key, "memory store set");
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<u64> {
        let removed = self.writable_entries()?.remove(key).is_some();
        debug!(%key, removed, "memory store delete");
        Ok(u64::from(removed))
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .entries()?
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> StoreResult<bool> {
        let mut entries = self.writable_entries()?;
        if entries.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(true)
    }
}
