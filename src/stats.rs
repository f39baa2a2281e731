//! Point-in-time usage counters.
//!
//! Snapshots are assembled lock-by-lock, so counters taken under concurrent
//! writes are individually accurate but not mutually consistent.

/// Usage counters for one slab class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassStats {
    /// Chunk size of this class in bytes.
    pub chunk_size: usize,
    /// Chunks currently holding a live item.
    pub chunks_used: usize,
    /// Carved chunks on the free list.
    pub chunks_free: usize,
    /// Pages carved for this class.
    pub pages: usize,
    /// Items on the hot tier.
    pub hot: usize,
    /// Items on the warm tier.
    pub warm: usize,
    /// Items on the cold tier.
    pub cold: usize,
}

/// Snapshot of cache-wide usage.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Bytes carved from the memory budget.
    pub allocated_bytes: usize,
    /// Index of the largest slab class.
    pub largest_class: usize,
    /// Items on the never-expire list.
    pub never_expire_items: usize,
    /// Per-class counters, indexed by class.
    pub classes: Vec<ClassStats>,
}

impl CacheStats {
    /// Total live items across all tiers and the never-expire list.
    pub fn total_items(&self) -> usize {
        self.never_expire_items
            + self
                .classes
                .iter()
                .map(|c| c.hot + c.warm + c.cold)
                .sum::<usize>()
    }
}
