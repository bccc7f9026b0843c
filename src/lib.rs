//! A concurrent key-value cache whose values may be reclaimed under memory
//! pressure.
//!
//! Entries are never evicted by a size or time policy computed inside the
//! cache.  Instead each value is held through a [`handle::SoftHandle`]
//! registered with a [`reclaimer::Reclaimer`]; when the reclaimer drops a
//! value, the handle is reported back through the cache's reclamation queue
//! and the entry is purged on the next mutating call.

mod builder;
mod cache;
mod store;
mod metrics;
pub mod buffer;
pub mod handle;
pub mod listener;
pub mod reclaimer;
pub mod weigher;

pub use builder::SoftCacheBuilder;
pub use cache::SoftCache;
pub use metrics::stats::Metrics;
