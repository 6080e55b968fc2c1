//! Lightweight repository counters. No allocations, no locks, just atomics.

use core::sync::atomic::{AtomicU64, Ordering};

/// Handle lifecycle metrics. All counters are monotonic.
#[derive(Debug)]
pub struct HandleMetrics {
    /// Entries created (string interned into a fresh or recycled value).
    pub interned: AtomicU64,
    /// Allocations served from the free heap.
    pub reused: AtomicU64,
    /// Entries destroyed after their last reference dropped.
    pub reclaimed: AtomicU64,
    /// High-water-mark decrements (free of the most recent allocation).
    pub unwound: AtomicU64,
    /// Handles pinned on behalf of a remote client.
    pub holds: AtomicU64,
    /// Handles released on behalf of a remote client.
    pub releases: AtomicU64,
    /// Holders destroyed wholesale (peer vanished or drained).
    pub holders_dropped: AtomicU64,
}

impl HandleMetrics {
    pub const fn new() -> Self {
        Self {
            interned: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
            unwound: AtomicU64::new(0),
            holds: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            holders_dropped: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn record_interned(&self, reused: bool) {
        self.interned.fetch_add(1, Ordering::Relaxed);
        if reused {
            self.reused.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    pub fn record_reclaimed(&self, unwound: bool) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
        if unwound {
            self.unwound.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    pub fn record_hold(&self) {
        self.holds.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_releases(&self, n: u64) {
        self.releases.fetch_add(n, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_holder_dropped(&self) {
        self.holders_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            interned: self.interned.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            unwound: self.unwound.load(Ordering::Relaxed),
            holds: self.holds.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            holders_dropped: self.holders_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for HandleMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`HandleMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub interned: u64,
    pub reused: u64,
    pub reclaimed: u64,
    pub unwound: u64,
    pub holds: u64,
    pub releases: u64,
    pub holders_dropped: u64,
}

impl MetricsSnapshot {
    /// Entries currently live: interned minus reclaimed.
    #[inline(always)]
    pub const fn live(&self) -> u64 {
        self.interned - self.reclaimed
    }
}
