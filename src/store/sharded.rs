use std::hash::Hash;
use std::sync::Arc;
use ahash::{AHashMap, RandomState};
use parking_lot::RwLock;

use crate::handle::SoftHandle;

/// One map entry: the handle currently published for a key.
pub type Slot<K, V> = Arc<SoftHandle<K, V>>;

// ---------------------------------------------------------------------------
// Shard
// ---------------------------------------------------------------------------

/// Cache-line padding to prevent false sharing between shards.
#[repr(align(64))]
pub(crate) struct Shard<K, V> {
    pub(crate) map: RwLock<AHashMap<K, Slot<K, V>>>,
}

// ---------------------------------------------------------------------------
// ShardedStore
// ---------------------------------------------------------------------------

/// A thread-safe map from key to soft handle, split into `N`
/// independently-locked shards.
///
/// Reads use a shared lock, writes use an exclusive lock, both per-shard.
/// Every method returns handles rather than values so that callers decide
/// what to do with a reclaimed one.
pub struct ShardedStore<K, V> {
    shards: Box<[Shard<K, V>]>,
    /// Always `shards.len() - 1`; shards.len() is a power of two.
    shard_mask: usize,
    /// Hasher used only to compute shard indices.
    build_hasher: RandomState,
}

impl<K: Hash + Eq + Clone, V> ShardedStore<K, V> {
    pub fn new(num_shards: usize) -> Self {
        assert!(num_shards.is_power_of_two());
        let shards = (0..num_shards)
            .map(|_| Shard {
                map: RwLock::new(AHashMap::new()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        ShardedStore {
            shards,
            shard_mask: num_shards - 1,
            build_hasher: RandomState::new(),
        }
    }

    #[inline]
    fn shard(&self, key: &K) -> &Shard<K, V> {
        let h = self.build_hasher.hash_one(key);
        // Use the high bits (better avalanche from ahash).
        &self.shards[((h >> 32) as usize) & self.shard_mask]
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    /// Returns the handle published for `key`, live or not.
    pub fn get(&self, key: &K) -> Option<Slot<K, V>> {
        self.shard(key).map.read().get(key).cloned()
    }

    /// Publishes `handle` under its key.  Returns the handle it replaced.
    pub fn insert(&self, handle: Slot<K, V>) -> Option<Slot<K, V>> {
        let key = handle.key().clone();
        self.shard(&key).map.write().insert(key, handle)
    }

    /// Removes the entry for `key`.  Returns the removed handle, if any.
    pub fn remove(&self, key: &K) -> Option<Slot<K, V>> {
        self.shard(key).map.write().remove(key)
    }

    /// Removes the entry for `handle.key()` only if it is `handle` itself.
    ///
    /// A newer handle published under the same key is left untouched.
    /// Returns `true` if an entry was removed.
    pub fn remove_if_same(&self, handle: &Slot<K, V>) -> bool {
        let key = handle.key();
        let mut map = self.shard(key).map.write();
        let same = map.get(key).map_or(false, |current| Arc::ptr_eq(current, handle));
        if same {
            map.remove(key);
        }
        same
    }

    /// Returns `true` if the key is present.
    pub fn contains(&self, key: &K) -> bool {
        self.shard(key).map.read().contains_key(key)
    }

    /// Returns the total number of entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.map.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.map.read().is_empty())
    }

    /// Removes every entry, handing the removed handles to `f` one shard at a
    /// time after that shard's lock has been released.
    pub fn clear_with(&self, mut f: impl FnMut(Slot<K, V>)) {
        for shard in self.shards.iter() {
            let drained: Vec<_> = shard.map.write().drain().map(|(_, h)| h).collect();
            for handle in drained {
                f(handle);
            }
        }
    }
}
