use std::hash::Hash;
use std::sync::Arc;
use parking_lot::Mutex;

use crate::buffer::drain::ReclamationQueue;
use crate::builder::SoftCacheBuilder;
use crate::handle::SoftHandle;
use crate::listener::{EvictionListener, RemovalCause};
use crate::metrics::stats::{Metrics, StatsCounter};
use crate::reclaimer::{Reclaimable, Reclaimer};
use crate::store::sharded::{ShardedStore, Slot};
use crate::weigher::Weigher;

// ---------------------------------------------------------------------------
// Cache interior
// ---------------------------------------------------------------------------

/// Shared interior of a [`SoftCache`].
pub(crate) struct Inner<K, V> {
    pub(crate) store: ShardedStore<K, V>,
    /// Handles whose value is gone but whose entry may still be in `store`.
    pub(crate) queue: Arc<ReclamationQueue<K, V>>,
    pub(crate) reclaimer: Arc<dyn Reclaimer>,
    pub(crate) weigher: Box<dyn Weigher<K, V>>,
    /// Optional eviction listener.  `None` if the user didn't register one.
    pub(crate) listener: Option<Box<dyn EvictionListener<K, V>>>,
    /// Held for the duration of a drain pass.
    pub(crate) drain_lock: Mutex<()>,
    pub(crate) metrics: StatsCounter,
}

// ---------------------------------------------------------------------------
// Cache handle
// ---------------------------------------------------------------------------

/// A concurrent cache whose values may be reclaimed under memory pressure.
///
/// Each value is held through a [`SoftHandle`] registered with the cache's
/// [`Reclaimer`].  When the reclaimer drops a value, the handle lands in the
/// cache's reclamation queue, and the next `put`, `remove` or `clear` purges
/// the corresponding entry before doing anything else.
///
/// `get` never drains: between reclamation and the next drain, the entry is
/// *stale* and `get` returns `None` for it.
///
/// # Example
/// ```
/// use softcache::SoftCache;
/// use std::sync::Arc;
///
/// let cache: SoftCache<String, String> = SoftCache::builder().build();
/// cache.put("hello".to_string(), "world".to_string());
/// assert_eq!(cache.get(&"hello".to_string()), Some(Arc::new("world".to_string())));
/// ```
pub struct SoftCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for SoftCache<K, V> {
    fn clone(&self) -> Self {
        SoftCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> SoftCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        num_shards: usize,
        reclaimer: Arc<dyn Reclaimer>,
        weigher: Box<dyn Weigher<K, V>>,
        listener: Option<Box<dyn EvictionListener<K, V>>>,
    ) -> Self {
        SoftCache {
            inner: Arc::new(Inner {
                store: ShardedStore::new(num_shards),
                queue: Arc::new(ReclamationQueue::new()),
                reclaimer,
                weigher,
                listener,
                drain_lock: Mutex::new(()),
                metrics: StatsCounter::new(),
            }),
        }
    }

    /// Returns a [`SoftCacheBuilder`] for constructing a new cache.
    pub fn builder() -> SoftCacheBuilder<K, V> {
        SoftCacheBuilder::new()
    }

    // -----------------------------------------------------------------------
    // Hot-path: get
    // -----------------------------------------------------------------------

    /// Returns the value for `key` if present and not yet reclaimed.
    ///
    /// Does not drain the reclamation queue.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let Some(handle) = self.inner.store.get(key) else {
            self.inner.metrics.record_miss();
            return None;
        };
        let value = handle.get();
        if value.is_some() {
            self.inner.metrics.record_hit();
        } else {
            self.inner.metrics.record_stale_hit();
        }
        value
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Inserts `value` for `key`, replacing any existing entry.
    ///
    /// Drains pending reclamations first, unless another thread is draining
    /// at that moment; that drain purges by handle identity, so it can never
    /// remove the entry published here.
    pub fn put(&self, key: K, value: V) {
        self.put_arc(key, Arc::new(value));
    }

    /// Inserts an already shared `value` for `key`.
    ///
    /// Reclamation only drops the cache's own reference; other owners of
    /// `value` keep it alive.
    pub fn put_arc(&self, key: K, value: Arc<V>) {
        self.try_drain();

        let weight = self.inner.weigher.weigh(&key, &*value).max(1);
        let handle = SoftHandle::new(key, value, weight, Arc::downgrade(&self.inner.queue));

        if let Some(old) = self.inner.store.insert(Arc::clone(&handle)) {
            self.notify(old.key(), old.get(), RemovalCause::Replaced);
        }

        // Published before it is registered, so any reclamation deposits a
        // handle the drain can still find in the map.  No lock is held: the
        // reclaimer may reclaim it on the spot, leaving a stale entry.
        let erased: Arc<dyn Reclaimable> = handle;
        self.inner.reclaimer.register(Arc::downgrade(&erased));
    }

    /// Removes the entry for `key`.
    ///
    /// Returns the value it held, or `None` if there was no entry or its value
    /// had already been reclaimed.  Like [`put`](Self::put), skips its own
    /// drain while another thread is draining.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.try_drain();

        let handle = self.inner.store.remove(key)?;
        let value = handle.get();
        self.notify(key, value.clone(), RemovalCause::Explicit);
        value
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.try_drain();
        self.inner.store.clear_with(|handle| {
            self.notify(handle.key(), handle.get(), RemovalCause::Explicit);
        });
    }

    // -----------------------------------------------------------------------
    // Drain
    // -----------------------------------------------------------------------

    /// Purges every entry whose value has been reclaimed so far.
    ///
    /// `put`, `remove` and `clear` do this implicitly.  Returns the number of
    /// entries purged.  Blocks while another thread is draining.
    pub fn purge(&self) -> usize {
        let purged = {
            let _guard = self.inner.drain_lock.lock();
            self.drain_pending()
        };
        self.dispatch_purged(purged)
    }

    /// Number of reclaimed handles waiting to be drained.
    pub fn pending_reclamations(&self) -> usize {
        self.inner.queue.len()
    }

    /// Drains unless another thread is already doing so.
    fn try_drain(&self) -> usize {
        if self.inner.queue.is_empty() {
            return 0;
        }
        let purged = {
            let Some(_guard) = self.inner.drain_lock.try_lock() else { return 0 };
            self.drain_pending()
        };
        self.dispatch_purged(purged)
    }

    /// Purges the entries of the handles pending at the start of the call.
    /// Handles deposited meanwhile wait for the next pass.
    fn drain_pending(&self) -> Vec<Slot<K, V>> {
        let pending = self.inner.queue.len();
        let mut purged = Vec::new();
        for _ in 0..pending {
            let Some(handle) = self.inner.queue.poll() else { break };
            // By identity: a newer handle under the same key must survive.
            if self.inner.store.remove_if_same(&handle) {
                purged.push(handle);
            } else {
                log::trace!("skipped reclaimed handle no longer in the map");
            }
        }
        if !purged.is_empty() {
            log::debug!("purged {} reclaimed entries ({} polled)", purged.len(), pending);
        }
        purged
    }

    /// Fires the listener for purged entries and records them.  Runs after the
    /// drain lock is released so listeners may call back into the cache.
    fn dispatch_purged(&self, purged: Vec<Slot<K, V>>) -> usize {
        let count = purged.len();
        if count > 0 {
            self.inner.metrics.record_reclaimed(count as u64);
        }
        for handle in purged {
            self.notify(handle.key(), None, RemovalCause::Reclaimed);
        }
        count
    }

    #[inline]
    fn notify(&self, key: &K, value: Option<Arc<V>>, cause: RemovalCause) {
        if let Some(listener) = &self.inner.listener {
            listener.on_evict(key, value, cause);
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> Metrics {
        self.inner.metrics.snapshot()
    }

    /// Number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Returns `true` if an entry exists for `key`, even a stale one.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.store.contains(key)
    }
}

impl<K, V> std::fmt::Debug for SoftCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftCache")
            .field("len", &self.len())
            .field("pending_reclamations", &self.pending_reclamations())
            .finish()
    }
}
