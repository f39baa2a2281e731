//! Cache configuration.
//!
//! A [`CacheConfig`] is supplied once to [`Cache::new`](crate::Cache::new)
//! and fixed for the lifetime of the cache: slab classes, the page budget,
//! and the bucket count are all derived from it at construction and never
//! resized afterwards.

use crate::error::ConfigError;

/// Upper bound on the number of slab classes a cache may carve.
pub const MAX_SLAB_CLASSES: usize = 64;

/// Upper bound on the number of LRU segments (`class x temperature`).
pub const MAX_SLAB_LRU: usize = MAX_SLAB_CLASSES * 3;

/// Default chunk-size progression between adjacent slab classes.
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.25;

/// Default smallest chunk size (96 bytes).
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 96;

/// Default largest chunk size (1 MiB).
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Default page size carved per slab-class refill (1 MiB).
pub const DEFAULT_PAGE_BYTES: usize = 1024 * 1024;

/// Default total memory budget (64 MiB).
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 64 * 1024 * 1024;

/// Default hash table bucket count (rounded up to a power of two).
pub const DEFAULT_TABLE_BUCKET_COUNT: usize = 1024;

/// Default TTL applied by `allocate_with_default_ttl` (1 hour).
pub const DEFAULT_EXPIRE_SECS: u64 = 3600;

/// Default staleness threshold before the sweep demotes an item to COLD.
pub const DEFAULT_STALENESS_SECS: u64 = 600;

/// Default bound on eviction candidates examined per allocation.
pub const DEFAULT_MAX_EVICTION_SCAN: usize = 8;

/// Fixed configuration for a [`Cache`](crate::Cache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Chunk-size progression between adjacent slab classes (> 1.0).
    pub growth_factor: f64,
    /// Smallest chunk size; the first slab class is at least this large.
    pub min_chunk_size: usize,
    /// Largest chunk size; items that do not fit are rejected.
    pub max_chunk_size: usize,
    /// Bytes carved from the budget each time a slab class grows.
    pub page_bytes: usize,
    /// Total memory budget across all slab classes.
    pub max_memory_bytes: usize,
    /// Number of hash buckets (rounded up to a power of two).
    pub table_bucket_count: usize,
    /// TTL in seconds used by `allocate_with_default_ttl`.
    pub default_expire_secs: u64,
    /// Seconds without access before the demotion sweep relabels an item COLD.
    pub staleness_secs: u64,
    /// Maximum eviction candidates examined before `OutOfMemory` is returned.
    pub max_eviction_scan: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            growth_factor: DEFAULT_GROWTH_FACTOR,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            page_bytes: DEFAULT_PAGE_BYTES,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            table_bucket_count: DEFAULT_TABLE_BUCKET_COUNT,
            default_expire_secs: DEFAULT_EXPIRE_SECS,
            staleness_secs: DEFAULT_STALENESS_SECS,
            max_eviction_scan: DEFAULT_MAX_EVICTION_SCAN,
        }
    }
}

impl CacheConfig {
    /// Checks every parameter, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.growth_factor > 1.0) {
            return Err(ConfigError::new("growth_factor must be > 1.0"));
        }
        if self.min_chunk_size == 0 {
            return Err(ConfigError::new("min_chunk_size must be > 0"));
        }
        if self.max_chunk_size < self.min_chunk_size {
            return Err(ConfigError::new("max_chunk_size must be >= min_chunk_size"));
        }
        if self.page_bytes < self.max_chunk_size {
            return Err(ConfigError::new(
                "page_bytes must be >= max_chunk_size so every class can carve a page",
            ));
        }
        if self.max_memory_bytes < self.page_bytes {
            return Err(ConfigError::new(
                "max_memory_bytes must cover at least one page",
            ));
        }
        if self.table_bucket_count == 0 {
            return Err(ConfigError::new("table_bucket_count must be > 0"));
        }
        if self.default_expire_secs == 0 {
            return Err(ConfigError::new("default_expire_secs must be > 0"));
        }
        if self.max_eviction_scan == 0 {
            return Err(ConfigError::new("max_eviction_scan must be > 0"));
        }
        Ok(())
    }
}
