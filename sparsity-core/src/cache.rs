//! Process-wide interning of sparsity patterns.
//!
//! Every canonical pattern handed out by a factory is looked up here first.
//! The table maps a structural hash to weakly held instances; a hit on a live,
//! equal instance returns that instance, so equal patterns are also identical
//! (`Sparsity::ptr_eq`). Expired entries are swept whenever the table grows,
//! and on demand through [`purge_cache`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use crate::pattern::{PatternData, Sparsity};

#[derive(Default)]
struct PatternCache {
    buckets: HashMap<u64, Vec<Weak<PatternData>>>,
}

/// Snapshot of the interning table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of distinct hash buckets
    pub buckets: usize,
    /// Weak entries held, expired ones included
    pub entries: usize,
    /// Entries whose pattern is still referenced somewhere
    pub live: usize,
}

fn cache() -> MutexGuard<'static, PatternCache> {
    static CACHE: OnceLock<Mutex<PatternCache>> = OnceLock::new();
    CACHE
        .get_or_init(|| Mutex::new(PatternCache::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PatternCache {
    fn sweep(&mut self) -> usize {
        let mut removed = 0;
        self.buckets.retain(|_, list| {
            let before = list.len();
            list.retain(|w| w.strong_count() > 0);
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }
}

/// Boost-style hash combination step.
#[inline]
fn hash_combine(seed: &mut u64, v: usize) {
    *seed ^= (v as u64)
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(*seed << 6)
        .wrapping_add(*seed >> 2);
}

/// Structural hash over shape and both index arrays.
pub(crate) fn hash_pattern(nrow: usize, ncol: usize, colind: &[usize], row: &[usize]) -> u64 {
    let mut seed = 0u64;
    hash_combine(&mut seed, nrow);
    hash_combine(&mut seed, ncol);
    for &c in colind {
        hash_combine(&mut seed, c);
    }
    for &r in row {
        hash_combine(&mut seed, r);
    }
    seed
}

/// Return the canonical instance for a validated pattern, inserting it if needed.
pub(crate) fn intern(data: PatternData) -> Sparsity {
    let mut cache = cache();
    let capacity = cache.buckets.capacity();

    if let Some(list) = cache.buckets.get_mut(&data.hash) {
        for weak in list.iter() {
            if let Some(existing) = weak.upgrade() {
                if existing.same_structure(&data) {
                    return Sparsity::from_arc(existing);
                }
            }
        }
        let inner = Arc::new(data);
        match list.iter_mut().find(|w| w.strong_count() == 0) {
            Some(slot) => *slot = Arc::downgrade(&inner),
            None => list.push(Arc::downgrade(&inner)),
        }
        return Sparsity::from_arc(inner);
    }

    let hash = data.hash;
    let inner = Arc::new(data);
    cache.buckets.insert(hash, vec![Arc::downgrade(&inner)]);

    if cache.buckets.capacity() != capacity {
        let removed = cache.sweep();
        if removed > 0 {
            log::debug!(
                "sparsity cache resized to {} buckets, swept {} expired entries",
                cache.buckets.capacity(),
                removed
            );
        }
    }
    Sparsity::from_arc(inner)
}

/// Remove expired entries from the interning table, returning how many were dropped.
///
/// Live patterns are unaffected; this is the explicit teardown hook for
/// hosts that check for leaked allocations at exit.
pub fn purge_cache() -> usize {
    let removed = cache().sweep();
    log::debug!("sparsity cache purge removed {} entries", removed);
    removed
}

/// Current size of the interning table.
pub fn cache_stats() -> CacheStats {
    let cache = cache();
    let mut stats = CacheStats {
        buckets: cache.buckets.len(),
        entries: 0,
        live: 0,
    };
    for list in cache.buckets.values() {
        stats.entries += list.len();
        stats.live += list.iter().filter(|w| w.strong_count() > 0).count();
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = hash_pattern(3, 2, &[0, 1, 3], &[0, 1, 2]);
        let b = hash_pattern(3, 2, &[0, 1, 3], &[0, 1, 2]);
        assert_eq!(a, b);
        assert_ne!(a, hash_pattern(3, 2, &[0, 2, 3], &[0, 1, 2]));
    }

    #[test]
    fn test_intern_returns_same_instance() {
        let a = Sparsity::triplet(7, 5, &[0, 3, 6], &[1, 2, 4]).unwrap();
        let b = Sparsity::triplet(7, 5, &[6, 0, 3], &[4, 1, 2]).unwrap();
        assert!(Sparsity::ptr_eq(&a, &b));
    }

    #[test]
    fn test_purge_keeps_live_patterns() {
        let keep = Sparsity::dense(11, 13);
        {
            let _tmp = Sparsity::dense(13, 11);
        }
        purge_cache();
        let again = Sparsity::dense(11, 13);
        assert!(Sparsity::ptr_eq(&keep, &again));
        let stats = cache_stats();
        assert!(stats.live >= 1);
        assert!(stats.entries >= stats.live);
    }
}
