//! Entry weigher — assigns a cost (weight) to each cached entry.
//!
//! The weight travels with the entry's handle to the reclaimer, which uses it
//! to account for how much memory the cache is softly holding.  By default
//! every entry costs 1 unit (`UnitWeigher`), so a budget is simply a number of
//! entries.  A custom weigher lets a budget approximate bytes instead.
//!
//! # Example
//! ```
//! use softcache::reclaimer::MemoryPressure;
//! use softcache::SoftCache;
//! use std::sync::Arc;
//!
//! // Keep roughly 10 MB of value bytes across every cache sharing `pressure`.
//! let pressure = Arc::new(MemoryPressure::with_budget(10 * 1024 * 1024));
//! let cache: SoftCache<String, Vec<u8>> = SoftCache::builder()
//!     .reclaimer(pressure)
//!     .weigher(|_key: &String, val: &Vec<u8>| val.len() as u64 + 1)
//!     .build();
//! # cache.put("k".to_string(), vec![0; 16]);
//! ```

/// Computes the cost of a cache entry.
///
/// The returned weight **must be ≥ 1**.  Returning 0 is treated as 1 so that
/// every entry is visible to budget accounting.
pub trait Weigher<K, V>: Send + Sync + 'static {
    fn weigh(&self, key: &K, value: &V) -> u64;
}

// ---------------------------------------------------------------------------
// Built-in implementations
// ---------------------------------------------------------------------------

/// Every entry costs exactly 1 unit.  This is the default weigher.
pub struct UnitWeigher;

impl<K, V> Weigher<K, V> for UnitWeigher {
    #[inline]
    fn weigh(&self, _key: &K, _value: &V) -> u64 {
        1
    }
}

/// A weigher backed by a closure.
///
/// Created via [`SoftCacheBuilder::weigher`](crate::SoftCacheBuilder::weigher).
pub struct FnWeigher<F>(pub F);

impl<K, V, F> Weigher<K, V> for FnWeigher<F>
where
    F: Fn(&K, &V) -> u64 + Send + Sync + 'static,
{
    #[inline]
    fn weigh(&self, key: &K, value: &V) -> u64 {
        (self.0)(key, value).max(1)
    }
}
