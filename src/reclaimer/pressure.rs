//! Weight-budgeted reclamation coordinator.
//!
//! [`MemoryPressure`] keeps every registered handle in registration order
//! together with its weight.  Pressure is applied in one of two ways:
//!
//! - a **budget**: after each registration, the oldest live handles are
//!   reclaimed until the tracked weight fits again;
//! - an explicit **signal**: [`MemoryPressure::reclaim`] frees at least the
//!   requested weight, [`MemoryPressure::reclaim_all`] frees everything.
//!
//! One coordinator may be shared (via `Arc`) by any number of caches, which
//! makes the budget process-wide rather than per-cache.
//!
//! Handles that were dropped by their cache, or reclaimed by someone else,
//! are discarded lazily: when they reach the front of the queue, during a
//! compaction pass once the queue has doubled in size, and before any
//! budget victim is chosen, so only live weight counts against the budget.
//!
//! # Example
//! ```
//! use softcache::reclaimer::MemoryPressure;
//! use softcache::SoftCache;
//! use std::sync::Arc;
//!
//! let pressure = Arc::new(MemoryPressure::unbounded());
//! let cache: SoftCache<u32, String> = SoftCache::builder()
//!     .reclaimer(Arc::clone(&pressure))
//!     .build();
//!
//! cache.put(1, "one".to_string());
//! assert!(cache.get(&1).is_some());
//!
//! pressure.reclaim_all();
//! assert!(cache.get(&1).is_none()); // stale until the next put/remove
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use super::{Reclaimable, Reclaimer};

/// Queue length below which compaction is never attempted.
const MIN_COMPACTION_LEN: usize = 64;

/// Outcome of a reclamation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Number of handles whose value was dropped by this pass.
    pub reclaimed: usize,
    /// Sum of the weights of those handles.
    pub freed_weight: u64,
}

impl ReclaimReport {
    fn merge(&mut self, other: ReclaimReport) {
        self.reclaimed += other.reclaimed;
        self.freed_weight = self.freed_weight.saturating_add(other.freed_weight);
    }
}

struct Tracked {
    handle: Weak<dyn Reclaimable>,
    weight: u64,
}

impl Tracked {
    /// Upgrades the handle if it still holds a value.
    #[inline]
    fn live(&self) -> Option<Arc<dyn Reclaimable>> {
        self.handle.upgrade().filter(|h| !h.is_reclaimed())
    }
}

struct State {
    /// Oldest registration at the front.
    entries: VecDeque<Tracked>,
    /// Sum of `weight` over `entries`, dead ones included.
    tracked_weight: u64,
    budget: Option<u64>,
    /// Next queue length at which a compaction pass runs.
    compact_at: usize,
}

impl State {
    fn push(&mut self, tracked: Tracked) {
        self.tracked_weight = self.tracked_weight.saturating_add(tracked.weight);
        self.entries.push_back(tracked);
        if self.entries.len() >= self.compact_at {
            self.compact();
        }
    }

    fn pop_front(&mut self) -> Option<Tracked> {
        let tracked = self.entries.pop_front()?;
        self.tracked_weight = self.tracked_weight.saturating_sub(tracked.weight);
        Some(tracked)
    }

    /// Discards dead or already-reclaimed entries at the front.
    fn skip_dead(&mut self) {
        while let Some(front) = self.entries.front() {
            if front.live().is_some() {
                return;
            }
            self.pop_front();
        }
    }

    /// Drops every dead entry and recomputes the tracked weight.
    fn compact(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|t| t.live().is_some());
        self.tracked_weight = self
            .entries
            .iter()
            .fold(0u64, |sum, t| sum.saturating_add(t.weight));
        self.compact_at = (self.entries.len() * 2).max(MIN_COMPACTION_LEN);
        log::trace!(
            "compacted reclamation queue: {} -> {} entries",
            before,
            self.entries.len()
        );
    }

    /// Pops live entries until the live weight fits within `budget`.
    ///
    /// `tracked_weight` also counts registrations dropped by their cache
    /// anywhere in the queue, so it is recomputed before choosing victims.
    fn over_budget_victims(&mut self, budget: u64, victims: &mut Vec<Arc<dyn Reclaimable>>) {
        if self.tracked_weight <= budget {
            return;
        }
        self.compact();
        loop {
            self.skip_dead();
            if self.tracked_weight <= budget {
                return;
            }
            let Some(tracked) = self.pop_front() else { return };
            if let Some(handle) = tracked.live() {
                victims.push(handle);
            }
        }
    }

    /// Pops live entries until at least `weight` units have been selected.
    fn victims_for(&mut self, weight: u64, victims: &mut Vec<Arc<dyn Reclaimable>>) {
        let mut selected = 0u64;
        while selected < weight {
            let Some(tracked) = self.pop_front() else { return };
            if let Some(handle) = tracked.live() {
                selected = selected.saturating_add(tracked.weight);
                victims.push(handle);
            }
        }
    }
}

/// A [`Reclaimer`] that reclaims the oldest handles first, either to stay
/// under a weight budget or in response to an explicit pressure signal.
pub struct MemoryPressure {
    state: Mutex<State>,
}

impl MemoryPressure {
    /// A coordinator that only reclaims when explicitly asked to.
    pub fn unbounded() -> Self {
        Self::build(None)
    }

    /// The process-wide coordinator used by caches built without an explicit
    /// reclaimer.  Starts unbounded; embedders apply pressure to it through
    /// [`set_budget`](Self::set_budget), [`reclaim`](Self::reclaim) or
    /// [`reclaim_all`](Self::reclaim_all).
    pub fn global() -> Arc<MemoryPressure> {
        static GLOBAL: OnceLock<Arc<MemoryPressure>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(MemoryPressure::unbounded())))
    }

    /// A coordinator that keeps the total weight of live registered handles
    /// at or below `max_weight`.
    pub fn with_budget(max_weight: u64) -> Self {
        Self::build(Some(max_weight))
    }

    fn build(budget: Option<u64>) -> Self {
        MemoryPressure {
            state: Mutex::new(State {
                entries: VecDeque::new(),
                tracked_weight: 0,
                budget,
                compact_at: MIN_COMPACTION_LEN,
            }),
        }
    }

    /// The current budget, `None` if unbounded.
    pub fn budget(&self) -> Option<u64> {
        self.state.lock().budget
    }

    /// Replaces the budget.  Lowering it reclaims immediately.
    pub fn set_budget(&self, budget: Option<u64>) -> ReclaimReport {
        let mut victims = Vec::new();
        {
            let mut state = self.state.lock();
            state.budget = budget;
            if let Some(max) = budget {
                state.over_budget_victims(max, &mut victims);
            }
        }
        Self::reclaim_victims(victims)
    }

    /// Reclaims the oldest live handles until at least `weight` units have
    /// been freed, or nothing live is left.
    pub fn reclaim(&self, weight: u64) -> ReclaimReport {
        let mut victims = Vec::new();
        self.state.lock().victims_for(weight, &mut victims);
        Self::reclaim_victims(victims)
    }

    /// Reclaims every live handle.
    pub fn reclaim_all(&self) -> ReclaimReport {
        let entries = {
            let mut state = self.state.lock();
            state.tracked_weight = 0;
            state.compact_at = MIN_COMPACTION_LEN;
            std::mem::take(&mut state.entries)
        };
        let victims = entries.iter().filter_map(Tracked::live).collect();
        Self::reclaim_victims(victims)
    }

    /// Total weight currently tracked.  May include handles that died since
    /// the last compaction.
    pub fn tracked_weight(&self) -> u64 {
        self.state.lock().tracked_weight
    }

    /// Number of registrations currently tracked, dead ones included.
    pub fn tracked_len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Runs `reclaim` on each victim.  Must be called without the state lock:
    /// reclaiming deposits into cache queues and drops values.
    fn reclaim_victims(victims: Vec<Arc<dyn Reclaimable>>) -> ReclaimReport {
        let mut report = ReclaimReport::default();
        for handle in victims {
            if handle.reclaim() {
                report.merge(ReclaimReport {
                    reclaimed: 1,
                    freed_weight: handle.weight(),
                });
            }
        }
        if report.reclaimed > 0 {
            log::debug!(
                "reclaimed {} values ({} weight units) under memory pressure",
                report.reclaimed,
                report.freed_weight
            );
        }
        report
    }
}

impl Default for MemoryPressure {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Reclaimer for MemoryPressure {
    fn register(&self, handle: Weak<dyn Reclaimable>) {
        let Some(weight) = handle.upgrade().map(|h| h.weight()) else {
            return;
        };
        let mut victims = Vec::new();
        {
            let mut state = self.state.lock();
            state.push(Tracked { handle, weight });
            if let Some(max) = state.budget {
                state.over_budget_victims(max, &mut victims);
            }
        }
        Self::reclaim_victims(victims);
    }
}

impl std::fmt::Debug for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryPressure")
            .field("budget", &state.budget)
            .field("tracked_len", &state.entries.len())
            .field("tracked_weight", &state.tracked_weight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SoftCache;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Dummy {
        weight: u64,
        reclaimed: AtomicBool,
    }

    impl Dummy {
        fn new(weight: u64) -> Arc<Self> {
            Arc::new(Dummy {
                weight,
                reclaimed: AtomicBool::new(false),
            })
        }
    }

    impl Reclaimable for Dummy {
        fn reclaim(&self) -> bool {
            !self.reclaimed.swap(true, Ordering::AcqRel)
        }

        fn is_reclaimed(&self) -> bool {
            self.reclaimed.load(Ordering::Acquire)
        }

        fn weight(&self) -> u64 {
            self.weight
        }
    }

    fn register(pressure: &MemoryPressure, handle: &Arc<Dummy>) {
        let erased: Arc<dyn Reclaimable> = handle.clone();
        pressure.register(Arc::downgrade(&erased));
    }

    #[test]
    fn unbounded_never_reclaims_on_register() {
        let pressure = MemoryPressure::unbounded();
        let handles: Vec<_> = (0..100).map(|_| Dummy::new(10)).collect();
        for h in &handles {
            register(&pressure, h);
        }
        assert!(handles.iter().all(|h| !h.is_reclaimed()));
        assert_eq!(pressure.tracked_weight(), 1_000);
    }

    #[test]
    fn budget_reclaims_oldest_first() {
        let pressure = MemoryPressure::with_budget(3);
        let handles: Vec<_> = (0..5).map(|_| Dummy::new(1)).collect();
        for h in &handles {
            register(&pressure, h);
        }
        let reclaimed: Vec<bool> = handles.iter().map(|h| h.is_reclaimed()).collect();
        assert_eq!(reclaimed, vec![true, true, false, false, false]);
        assert_eq!(pressure.tracked_weight(), 3);
    }

    #[test]
    fn dead_handles_do_not_count_as_victims() {
        let pressure = MemoryPressure::with_budget(2);
        let first = Dummy::new(1);
        let second = Dummy::new(1);
        register(&pressure, &first);
        register(&pressure, &second);
        drop(first);

        let third = Dummy::new(1);
        register(&pressure, &third);
        assert!(!second.is_reclaimed(), "the dead entry should absorb the overflow");
        assert!(!third.is_reclaimed());
    }

    #[test]
    fn explicit_reclaim_frees_requested_weight() {
        let pressure = MemoryPressure::unbounded();
        let handles: Vec<_> = (0..4).map(|_| Dummy::new(5)).collect();
        for h in &handles {
            register(&pressure, h);
        }
        let report = pressure.reclaim(7);
        assert_eq!(
            report,
            ReclaimReport {
                reclaimed: 2,
                freed_weight: 10
            }
        );
        assert!(handles[0].is_reclaimed() && handles[1].is_reclaimed());
        assert!(!handles[2].is_reclaimed());
    }

    #[test]
    fn reclaim_all_empties_the_queue() {
        let pressure = MemoryPressure::unbounded();
        let handles: Vec<_> = (0..3).map(|_| Dummy::new(2)).collect();
        for h in &handles {
            register(&pressure, h);
        }
        // Already reclaimed elsewhere: not counted again.
        handles[1].reclaim();

        let report = pressure.reclaim_all();
        assert_eq!(report.reclaimed, 2);
        assert_eq!(pressure.tracked_len(), 0);
        assert_eq!(pressure.tracked_weight(), 0);
    }

    #[test]
    fn lowering_budget_applies_pressure() {
        let pressure = MemoryPressure::unbounded();
        let handles: Vec<_> = (0..4).map(|_| Dummy::new(1)).collect();
        for h in &handles {
            register(&pressure, h);
        }
        let report = pressure.set_budget(Some(1));
        assert_eq!(report.reclaimed, 3);
        assert_eq!(pressure.budget(), Some(1));
        assert!(!handles[3].is_reclaimed());
    }

    #[test]
    fn overwritten_entries_do_not_count_against_budget() {
        let pressure = Arc::new(MemoryPressure::with_budget(10));
        let cache: SoftCache<u32, u32> = SoftCache::builder()
            .reclaimer(Arc::clone(&pressure))
            .build();

        for i in 0..10 {
            cache.put(i, i);
        }
        for round in 0..5 {
            cache.put(9, 100 + round);
        }
        let live = (0..10).filter(|k| cache.get(k).is_some()).count();
        assert_eq!(live, 10, "live weight never exceeded the budget");
        assert_eq!(pressure.tracked_weight(), 10);
    }

    #[test]
    fn removed_entries_do_not_count_against_budget() {
        let pressure = Arc::new(MemoryPressure::with_budget(2));
        let cache: SoftCache<u32, u32> = SoftCache::builder()
            .reclaimer(Arc::clone(&pressure))
            .build();

        cache.put(1, 1);
        cache.put(2, 2);
        cache.remove(&2);
        cache.put(3, 3);
        assert_eq!(cache.get(&1), Some(Arc::new(1)));
        assert_eq!(cache.get(&3), Some(Arc::new(3)));
    }

    #[test]
    fn huge_weights_saturate() {
        let pressure = MemoryPressure::unbounded();
        let handles: Vec<_> = (0..3).map(|_| Dummy::new(u64::MAX / 2)).collect();
        for h in &handles {
            register(&pressure, h);
        }
        assert_eq!(pressure.tracked_weight(), u64::MAX);

        let report = pressure.reclaim(u64::MAX);
        assert_eq!(report.reclaimed, 3);
        assert_eq!(report.freed_weight, u64::MAX);
    }

    #[test]
    fn compaction_drops_dead_registrations() {
        let pressure = MemoryPressure::unbounded();
        for _ in 0..MIN_COMPACTION_LEN * 2 {
            let h = Dummy::new(1);
            register(&pressure, &h);
        }
        assert!(pressure.tracked_len() < MIN_COMPACTION_LEN);
    }
}
