use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated on every cache operation.
pub struct StatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    reclaimed: AtomicU64,
}

impl StatsCounter {
    pub fn new() -> Self {
        StatsCounter {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_hits: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reclaimed(&self, count: u64) {
        self.reclaimed.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the statistics.
    pub fn snapshot(&self) -> Metrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let stale_hits = self.stale_hits.load(Ordering::Relaxed);
        let reclaimed = self.reclaimed.load(Ordering::Relaxed);
        let total = hits + misses + stale_hits;
        let hit_rate = if total == 0 {
            0.0_f64
        } else {
            hits as f64 / total as f64
        };
        Metrics {
            hits,
            misses,
            stale_hits,
            reclaimed,
            hit_rate,
        }
    }
}

impl Default for StatsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Lookups that returned a live value.
    pub hits: u64,
    /// Lookups that found no entry.
    pub misses: u64,
    /// Lookups that found an entry whose value was already reclaimed.
    pub stale_hits: u64,
    /// Entries purged by the drain after their value was reclaimed.
    pub reclaimed: u64,
    /// `hits / (hits + misses + stale_hits)`, or `0.0` if no lookups were made.
    pub hit_rate: f64,
}

impl Metrics {
    pub fn request_count(&self) -> u64 {
        self.hits + self.misses + self.stale_hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_hits_count_against_hit_rate() {
        let stats = StatsCounter::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_stale_hit();
        stats.record_stale_hit();

        let m = stats.snapshot();
        assert_eq!(m.request_count(), 4);
        assert!((m.hit_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn empty_snapshot_has_zero_rate() {
        let m = StatsCounter::default().snapshot();
        assert_eq!(m.hit_rate, 0.0);
        assert_eq!(m.reclaimed, 0);
    }
}
