//! Eviction listener — a callback invoked whenever an entry leaves the cache.
//!
//! # Example
//! ```
//! use softcache::listener::RemovalCause;
//! use softcache::reclaimer::MemoryPressure;
//! use softcache::SoftCache;
//! use std::sync::{Arc, Mutex};
//!
//! let log: Arc<Mutex<Vec<(u64, RemovalCause)>>> = Arc::new(Mutex::new(Vec::new()));
//! let log2 = Arc::clone(&log);
//! let pressure = Arc::new(MemoryPressure::unbounded());
//!
//! let cache: SoftCache<u64, u64> = SoftCache::builder()
//!     .reclaimer(Arc::clone(&pressure))
//!     .eviction_listener(move |key: &u64, _val, cause| {
//!         log2.lock().unwrap().push((*key, cause));
//!     })
//!     .build();
//!
//! cache.put(1, 10);
//! cache.put(1, 11); // replaced
//! pressure.reclaim_all();
//! cache.remove(&2); // drains: key 1 is purged as reclaimed
//! assert_eq!(
//!     *log.lock().unwrap(),
//!     vec![(1, RemovalCause::Replaced), (1, RemovalCause::Reclaimed)]
//! );
//! ```

use std::sync::Arc;

// ---------------------------------------------------------------------------
// RemovalCause
// ---------------------------------------------------------------------------

/// The reason an entry was removed from the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalCause {
    /// The reclaimer dropped the value and the drain purged the entry.
    /// The listener receives no value.
    Reclaimed,
    /// Overwritten by [`SoftCache::put`].
    ///
    /// [`SoftCache::put`]: crate::SoftCache::put
    Replaced,
    /// Removed via [`SoftCache::remove`] or [`SoftCache::clear`].
    ///
    /// [`SoftCache::remove`]: crate::SoftCache::remove
    /// [`SoftCache::clear`]: crate::SoftCache::clear
    Explicit,
}

// ---------------------------------------------------------------------------
// EvictionListener trait
// ---------------------------------------------------------------------------

/// A callback invoked each time an entry leaves the cache.
///
/// The callback receives:
/// - a reference to the removed key,
/// - the value if it was still live (`None` for reclaimed entries, and for
///   replaced or removed entries whose value had already been reclaimed),
/// - the reason for removal.
///
/// Listeners run on the thread performing the cache operation, after all
/// internal locks have been released, so a listener may call back into the
/// same cache, `purge` included.
pub trait EvictionListener<K, V>: Send + Sync + 'static {
    fn on_evict(&self, key: &K, value: Option<Arc<V>>, cause: RemovalCause);
}

/// An [`EvictionListener`] backed by a closure.
///
/// Created via [`SoftCacheBuilder::eviction_listener`](crate::SoftCacheBuilder::eviction_listener).
pub struct FnListener<F>(pub F);

impl<K, V, F> EvictionListener<K, V> for FnListener<F>
where
    F: Fn(&K, Option<Arc<V>>, RemovalCause) + Send + Sync + 'static,
{
    fn on_evict(&self, key: &K, value: Option<Arc<V>>, cause: RemovalCause) {
        (self.0)(key, value, cause)
    }
}
