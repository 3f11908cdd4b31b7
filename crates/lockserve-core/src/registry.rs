//! Lazy per-resource lock registry
//!
//! A fixed-bucket hash table mapping resource names to the `FairRwLock`
//! that guards them. Locks are created on first reference and live until
//! the registry is torn down; the same key always yields the same lock.
//!
//! One coarse mutex covers the whole table. Finer per-bucket locking would
//! not remove the race where two threads both find a key absent and both
//! create a lock for it: the scan and the insert have to be one atomic
//! step. The mutex is held only for hash + scan + possible append, never
//! while waiting on a resource lock.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHasher;

use crate::error::{RegistryError, RegistryResult};
use crate::fair_rwlock::{FairRwLock, DEFAULT_FAIRNESS};

/// Number of buckets
pub const TABLE_SIZE: usize = 128;

/// Longest accepted resource key, in bytes
pub const MAX_KEY_LEN: usize = 255;

/// One resource's lock, keyed by resource name
struct LockEntry {
    key: Box<str>,
    lock: Arc<FairRwLock>,
}

/// Bucket index for `key`
///
/// A pure function of the key bytes: `FxHasher` is unseeded, so the
/// mapping is stable for the life of the process (and across runs).
#[inline]
pub fn bucket_index(key: &str) -> usize {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() % TABLE_SIZE as u64) as usize
}

/// Registry of per-resource `FairRwLock`s with get-or-create lookups
///
/// Constructed once at startup and shared (by `Arc`) with every worker.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use lockserve_core::LockRegistry;
///
/// let registry = LockRegistry::new();
/// let a = registry.get_or_create("a.txt").unwrap();
/// let b = registry.get_or_create("a.txt").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(registry.len(), 1);
/// ```
pub struct LockRegistry {
    buckets: Mutex<Vec<Vec<LockEntry>>>,
    fairness: usize,
}

impl LockRegistry {
    /// Create an empty registry whose locks use `DEFAULT_FAIRNESS`
    pub fn new() -> Self {
        Self::with_fairness(DEFAULT_FAIRNESS)
    }

    /// Create an empty registry whose locks admit `n` consecutive readers
    /// ahead of a waiting writer
    pub fn with_fairness(n: usize) -> Self {
        let buckets = (0..TABLE_SIZE).map(|_| Vec::new()).collect();
        Self {
            buckets: Mutex::new(buckets),
            fairness: n.max(1),
        }
    }

    #[inline]
    pub fn fairness(&self) -> usize {
        self.fairness
    }

    // Nothing panics while the table mutex is held, so the table is
    // consistent even if a guard was poisoned elsewhere.
    #[inline]
    fn table(&self) -> MutexGuard<'_, Vec<Vec<LockEntry>>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the lock for `key`, creating and registering it if absent
    ///
    /// Concurrent callers racing on the same new key all receive the same
    /// lock; exactly one of them creates it.
    pub fn get_or_create(&self, key: &str) -> RegistryResult<Arc<FairRwLock>> {
        if key.len() > MAX_KEY_LEN {
            return Err(RegistryError::KeyTooLong {
                len: key.len(),
                max: MAX_KEY_LEN,
            });
        }

        let mut table = self.table();
        let bucket = &mut table[bucket_index(key)];

        if let Some(entry) = bucket.iter().find(|e| &*e.key == key) {
            return Ok(Arc::clone(&entry.lock));
        }

        bucket
            .try_reserve(1)
            .map_err(|_| RegistryError::AllocationFailed)?;
        let lock = Arc::new(FairRwLock::new(self.fairness));
        bucket.push(LockEntry {
            key: key.into(),
            lock: Arc::clone(&lock),
        });
        Ok(lock)
    }

    /// Return the lock for `key` if one was already created
    #[cfg(test)]
    pub(crate) fn get(&self, key: &str) -> Option<Arc<FairRwLock>> {
        let table = self.table();
        table[bucket_index(key)]
            .iter()
            .find(|e| &*e.key == key)
            .map(|e| Arc::clone(&e.lock))
    }

    /// Number of locks created so far
    pub fn len(&self) -> usize {
        self.table().iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys stored in one bucket, in insertion order
    #[cfg(test)]
    pub(crate) fn bucket_keys(&self, index: usize) -> Vec<String> {
        self.table()
            .get(index)
            .map(|b| b.iter().map(|e| e.key.to_string()).collect())
            .unwrap_or_default()
    }

    /// Tear the registry down, dropping every lock and bucket in one pass
    ///
    /// Consuming `self` means no lookup can be in flight. Returns the number
    /// of locks destroyed.
    pub fn destroy_all(self) -> usize {
        let table = self
            .buckets
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let mut destroyed = 0;
        for bucket in table {
            for entry in bucket {
                let stats = entry.lock.stats();
                debug_assert!(
                    stats.active_readers == 0 && !stats.writer_active,
                    "lock for {:?} destroyed while held",
                    entry.key
                );
                destroyed += 1;
            }
        }
        destroyed
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockRegistry")
            .field("locks", &self.len())
            .field("fairness", &self.fairness)
            .finish()
    }
}
