use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::RwLock;

/// Per-key critical sections
///
/// Writers for the same key run one at a time, while writers for different keys never wait on
/// each other. Readers of a key run together, but wait for an in-flight writer of that key.
///
/// Each key gets its own fair (FIFO) [`RwLock`], created on first use and dropped again once
/// nobody holds or waits for it, so the table only grows with the number of keys in use.
#[derive(Debug)]
pub struct KeyLockManager<K> {
    locks: Mutex<HashMap<K, Arc<RwLock<()>>>>,
}

impl<K> Default for KeyLockManager<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyLockManager<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while no other `with_exclusive` or `with_shared` call for `key` runs
    ///
    /// The lock is released when `f` completes, whether it succeeds, fails, panics, or the
    /// returned future is dropped.
    pub async fn with_exclusive<F, Fut, T>(&self, key: K, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lease = self.lease(key);
        let _guard = lease.lock.write().await;
        f().await
    }

    /// Run `f` while no `with_exclusive` call for `key` runs
    pub async fn with_shared<F, Fut, T>(&self, key: K, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lease = self.lease(key);
        let _guard = lease.lock.read().await;
        f().await
    }

    /// Number of keys currently held or waited for
    pub fn active_keys(&self) -> usize {
        self.table().len()
    }

    fn lease(&self, key: K) -> Lease<'_, K> {
        let lock = self
            .table()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone();

        Lease {
            manager: self,
            key,
            lock,
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<K, Arc<RwLock<()>>>> {
        // The table holds no invariant a panic could break
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reference to the lock of a key, pruning the table entry when the last one goes away
struct Lease<'a, K: Eq + Hash + Clone> {
    manager: &'a KeyLockManager<K>,
    key: K,
    lock: Arc<RwLock<()>>,
}

impl<K: Eq + Hash + Clone> Drop for Lease<'_, K> {
    fn drop(&mut self) {
        let mut locks = self.manager.table();
        // One reference in the table, one in this lease
        if Arc::strong_count(&self.lock) == 2
            && locks
                .get(&self.key)
                .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock))
        {
            locks.remove(&self.key);
        }
    }
}
