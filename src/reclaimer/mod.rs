//! The boundary between the cache and whatever decides when memory is scarce.
//!
//! A cache registers every handle it creates with its [`Reclaimer`].  The
//! reclaimer only receives a `Weak<dyn Reclaimable>`: it can clear a value
//! under pressure, but it can never keep a removed entry alive, and a single
//! reclaimer can serve caches of different key and value types.
//!
//! [`MemoryPressure`] is the built-in implementation.  Tests and embedders can
//! supply their own, e.g. one that reacts to allocator statistics or an OS
//! low-memory signal.

pub mod pressure;

use std::sync::Weak;

pub use pressure::{MemoryPressure, ReclaimReport};

/// A value holder whose payload can be dropped on demand.
pub trait Reclaimable: Send + Sync {
    /// Drops the held value and notifies the owning cache.
    ///
    /// Returns `true` if a value was actually reclaimed, `false` if it was
    /// already gone.
    fn reclaim(&self) -> bool;

    /// Returns `true` once [`reclaim`](Reclaimable::reclaim) has succeeded.
    fn is_reclaimed(&self) -> bool;

    /// Cost of the held value as computed by the cache's weigher.
    fn weight(&self) -> u64;
}

/// Tracks reclaimable handles and decides when to reclaim them.
///
/// `register` is called from `SoftCache::put` with no cache lock held, so an
/// implementation may reclaim synchronously, including the handle it was just
/// given.
pub trait Reclaimer: Send + Sync + 'static {
    fn register(&self, handle: Weak<dyn Reclaimable>);
}
