//! Cache statistics tracking and reporting

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time statistics for cache lookups
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub total_entries: usize,
}

impl CacheStatistics {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Get total lookups count
    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Lock-free hit/miss counters
#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, total_entries: usize) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            total_entries,
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStatistics {
            hits: 3,
            misses: 1,
            total_entries: 2,
        };
        assert_eq!(stats.hit_rate(), 75.0);
        assert_eq!(stats.total_lookups(), 4);
        assert_eq!(CacheStatistics::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_counters_snapshot_and_reset() {
        let counters = Counters::default();
        counters.record_hit();
        counters.record_miss();
        counters.record_miss();
        let stats = counters.snapshot(5);
        assert_eq!((stats.hits, stats.misses, stats.total_entries), (1, 2, 5));

        counters.reset();
        assert_eq!(counters.snapshot(0), CacheStatistics::default());
    }
}
