//! Soft handle: the per-entry wrapper that holds a value until it is reclaimed.
//!
//! A [`SoftHandle`] keeps its value alive through a "soft" strong reference
//! that the memory reclaimer may clear at any time.  Clearing happens through
//! [`Reclaimable::reclaim`], which also deposits the handle into its cache's
//! reclamation queue so the map entry can be purged on the next drain.
//!
//! Callers that still hold an `Arc<V>` obtained from the cache keep the value
//! alive after it has been reclaimed; only the cache's own reference goes away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::buffer::drain::ReclamationQueue;
use crate::reclaimer::Reclaimable;

/// A reclaimable reference to a cached value, tagged with its key.
pub struct SoftHandle<K, V> {
    key: K,
    /// The soft reference.  `None` once reclaimed.
    slot: Mutex<Option<Arc<V>>>,
    weight: u64,
    /// Set on the live → reclaimed transition, before the handle is enqueued.
    reclaimed: AtomicBool,
    queue: Weak<ReclamationQueue<K, V>>,
    this: Weak<SoftHandle<K, V>>,
}

impl<K, V> SoftHandle<K, V> {
    pub(crate) fn new(
        key: K,
        value: Arc<V>,
        weight: u64,
        queue: Weak<ReclamationQueue<K, V>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| SoftHandle {
            key,
            slot: Mutex::new(Some(value)),
            weight: weight.max(1),
            reclaimed: AtomicBool::new(false),
            queue,
            this: this.clone(),
        })
    }

    /// The key this handle was created for.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the value if it has not been reclaimed yet.
    #[inline]
    pub fn get(&self) -> Option<Arc<V>> {
        self.slot.lock().clone()
    }

    /// Weight reported to the reclaimer when the handle was registered.
    #[inline]
    pub fn weight(&self) -> u64 {
        self.weight
    }

    /// Returns `true` once the value has been reclaimed.
    #[inline]
    pub fn is_reclaimed(&self) -> bool {
        self.reclaimed.load(Ordering::Acquire)
    }
}

impl<K, V> Reclaimable for SoftHandle<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn reclaim(&self) -> bool {
        let Some(value) = self.slot.lock().take() else {
            return false;
        };
        self.reclaimed.store(true, Ordering::Release);
        // Drop our reference outside the slot lock; `V::drop` may be arbitrary.
        drop(value);

        // A handle being dropped has no map entry left to purge.
        if let (Some(queue), Some(this)) = (self.queue.upgrade(), self.this.upgrade()) {
            queue.deposit(this);
        }
        true
    }

    #[inline]
    fn is_reclaimed(&self) -> bool {
        SoftHandle::is_reclaimed(self)
    }

    #[inline]
    fn weight(&self) -> u64 {
        self.weight
    }
}

impl<K: std::fmt::Debug, V> std::fmt::Debug for SoftHandle<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftHandle")
            .field("key", &self.key)
            .field("weight", &self.weight)
            .field("reclaimed", &self.is_reclaimed())
            .finish()
    }
}
