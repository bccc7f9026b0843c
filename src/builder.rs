use std::hash::Hash;
use std::sync::Arc;
use crate::cache::SoftCache;
use crate::listener::{EvictionListener, FnListener, RemovalCause};
use crate::reclaimer::{MemoryPressure, Reclaimer};
use crate::weigher::{FnWeigher, UnitWeigher, Weigher};

/// Builder for configuring and constructing a [`SoftCache`].
///
/// Unless a reclaimer is supplied, the cache registers its handles with
/// [`MemoryPressure::global`].
///
/// # Example
/// ```
/// use softcache::reclaimer::MemoryPressure;
/// use softcache::SoftCache;
/// use std::sync::Arc;
///
/// let cache: SoftCache<String, String> = SoftCache::builder()
///     .num_shards(4)
///     .reclaimer(Arc::new(MemoryPressure::with_budget(1_000)))
///     .build();
/// ```
pub struct SoftCacheBuilder<K, V> {
    num_shards: usize,
    reclaimer: Option<Arc<dyn Reclaimer>>,
    weigher: Box<dyn Weigher<K, V>>,
    listener: Option<Box<dyn EvictionListener<K, V>>>,
}

impl<K: 'static, V: 'static> SoftCacheBuilder<K, V> {
    pub fn new() -> Self {
        SoftCacheBuilder {
            num_shards: 16,
            reclaimer: None,
            weigher: Box::new(UnitWeigher),
            listener: None,
        }
    }

    /// Set the number of internal shards (must be a power of two; default: 16).
    pub fn num_shards(mut self, n: usize) -> Self {
        assert!(n > 0 && n.is_power_of_two(), "num_shards must be a power of two");
        self.num_shards = n;
        self
    }

    /// Register the cache's handles with `reclaimer`.
    ///
    /// The same reclaimer may be shared by several caches.
    pub fn reclaimer<R: Reclaimer>(mut self, reclaimer: Arc<R>) -> Self {
        self.reclaimer = Some(reclaimer);
        self
    }

    /// Like [`reclaimer`](Self::reclaimer), for an already type-erased one.
    pub fn reclaimer_dyn(mut self, reclaimer: Arc<dyn Reclaimer>) -> Self {
        self.reclaimer = Some(reclaimer);
        self
    }

    /// Register an eviction listener closure.
    ///
    /// The closure is called **synchronously on the calling thread** each
    /// time an entry is removed for any reason (reclamation, replacement, or
    /// explicit removal).
    ///
    /// # Example
    /// ```
    /// use softcache::SoftCache;
    ///
    /// let cache: SoftCache<u64, u64> = SoftCache::builder()
    ///     .eviction_listener(|key: &u64, _val, cause| {
    ///         println!("removed key={key} cause={cause:?}");
    ///     })
    ///     .build();
    /// ```
    pub fn eviction_listener<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, Option<Arc<V>>, RemovalCause) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(FnListener(f)));
        self
    }

    /// Register an eviction listener via the [`EvictionListener`] trait.
    pub fn eviction_listener_impl<L: EvictionListener<K, V>>(mut self, l: L) -> Self {
        self.listener = Some(Box::new(l));
        self
    }

    /// Set a custom entry weigher via closure.
    ///
    /// The weight is reported to the reclaimer with each new handle.
    pub fn weigher<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &V) -> u64 + Send + Sync + 'static,
    {
        self.weigher = Box::new(FnWeigher(f));
        self
    }

    /// Set a weigher using any type that implements the [`Weigher`] trait.
    pub fn weigher_impl<W: Weigher<K, V>>(mut self, w: W) -> Self {
        self.weigher = Box::new(w);
        self
    }
}

impl<K: 'static, V: 'static> Default for SoftCacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SoftCacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn build(self) -> SoftCache<K, V> {
        let reclaimer = self
            .reclaimer
            .unwrap_or_else(|| MemoryPressure::global() as Arc<dyn Reclaimer>);
        SoftCache::new(self.num_shards, reclaimer, self.weigher, self.listener)
    }
}
