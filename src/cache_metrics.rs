//! Shared atomic counters for the bounded-LRU caches in [`crate::flow`],
//! [`crate::burst`], and [`crate::classify`].
//!
//! All three caches shape recency/eviction the same way (a sequence-tagged
//! `BinaryHeap` with lazy deletion), so they share one counter struct here
//! rather than three near-identical copies. There is no hit/miss outcome to
//! track the way a template lookup has one — every `record`/`classify` call
//! either creates an entry or reuses one — so the fields name that
//! distinction instead.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters for one bounded cache, safe to read concurrently
/// even though the cache itself is single-threaded-per-instance (mirrors the
/// teacher's `CacheMetrics` doc comment on this point).
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub created: AtomicU64,
    pub reused: AtomicU64,
    pub evicted: AtomicU64,
    pub heap_compactions: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reused(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_heap_compaction(&self) {
        self.heap_compactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            heap_compactions: self.heap_compactions.load(Ordering::Relaxed),
        }
    }
}

/// A consistent, non-atomic view of [`CacheMetrics`] at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheMetricsSnapshot {
    pub created: u64,
    pub reused: u64,
    pub evicted: u64,
    pub heap_compactions: u64,
}
