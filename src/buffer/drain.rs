//! Unbounded MPMC reclamation queue backed by a lock-free `SegQueue`.
//!
//! The memory reclaimer deposits handles here from whatever thread happens to
//! apply pressure.  The cache polls the queue at the start of every mutating
//! operation and purges the map entries those handles still own.
//!
//! Unlike a write buffer, nothing here may be dropped on the floor: a lost
//! handle would leave a stale entry in the map until it is overwritten or
//! removed.  The queue is therefore unbounded; its size is bounded in practice
//! by the number of live entries, since each handle is deposited at most once.

use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::handle::SoftHandle;

/// Queue of handles whose values have already been reclaimed.
pub struct ReclamationQueue<K, V> {
    queue: SegQueue<Arc<SoftHandle<K, V>>>,
}

impl<K, V> ReclamationQueue<K, V> {
    pub fn new() -> Self {
        ReclamationQueue {
            queue: SegQueue::new(),
        }
    }

    /// Enqueues a reclaimed handle.
    ///
    /// Only [`SoftHandle`] calls this, once, after clearing its value.
    #[inline]
    pub(crate) fn deposit(&self, handle: Arc<SoftHandle<K, V>>) {
        debug_assert!(handle.is_reclaimed());
        self.queue.push(handle);
    }

    /// Returns the next reclaimed handle, or `None` if nothing is pending.
    ///
    /// Never blocks.
    #[inline]
    pub fn poll(&self) -> Option<Arc<SoftHandle<K, V>>> {
        self.queue.pop()
    }

    /// Number of handles currently pending.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<K, V> Default for ReclamationQueue<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
