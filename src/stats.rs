//! Install and fetch statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Statistics for a completed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStats {
    /// Number of assets written to the store.
    pub assets_cached: usize,
    /// Total body bytes written.
    pub total_bytes: u64,
    /// Time taken to fetch and store every asset.
    pub elapsed: Duration,
}

impl Default for InstallStats {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallStats {
    /// Creates empty install stats.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            assets_cached: 0,
            total_bytes: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Builder that accumulates install stats while assets are stored.
pub struct InstallStatsBuilder {
    start_time: Instant,
    stats: InstallStats,
}

impl Default for InstallStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallStatsBuilder {
    /// Starts timing a new install.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            stats: InstallStats::new(),
        }
    }

    /// Records one stored asset.
    pub fn add_asset(&mut self, bytes: u64) {
        self.stats.assets_cached += 1;
        self.stats.total_bytes += bytes;
    }

    /// Finishes timing and returns the stats.
    #[must_use]
    pub fn build(mut self) -> InstallStats {
        self.stats.elapsed = self.start_time.elapsed();
        self.stats
    }
}

/// Snapshot of how fetches were answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Answered by the live network.
    pub network: u64,
    /// Network failed, answered from the cache.
    pub cache_fallback: u64,
    /// Network failed and the cache had no entry.
    pub unavailable: u64,
}

impl FetchStats {
    /// Total fetches observed.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.network + self.cache_fallback + self.unavailable
    }
}

/// Lock-free fetch counters shared by concurrent fetch handlers.
#[derive(Debug, Default)]
pub struct FetchStatsTracker {
    network: AtomicU64,
    cache_fallback: AtomicU64,
    unavailable: AtomicU64,
}

impl FetchStatsTracker {
    /// Creates zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            network: AtomicU64::new(0),
            cache_fallback: AtomicU64::new(0),
            unavailable: AtomicU64::new(0),
        }
    }

    /// Records a fetch answered by the network.
    pub fn record_network(&self) {
        self.network.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a fetch answered from the cache after a network failure.
    pub fn record_cache_fallback(&self) {
        self.cache_fallback.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a fetch that neither the network nor the cache could answer.
    pub fn record_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current counts.
    #[must_use]
    pub fn snapshot(&self) -> FetchStats {
        FetchStats {
            network: self.network.load(Ordering::Relaxed),
            cache_fallback: self.cache_fallback.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
        }
    }
}
