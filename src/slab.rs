//! Slab allocator: fixed-size chunk classes carved from a byte budget.
//!
//! Chunk sizes are pre-computed at construction by a growth-factor sequence
//! (memcached-style classing): the smallest class starts at
//! `min_chunk_size`, each subsequent class is `growth_factor` larger, the
//! last class is exactly `max_chunk_size`. An allocation picks the smallest
//! class whose chunk size covers the item, bounding internal fragmentation
//! without a general allocator's per-item free-list search.
//!
//! Each class carves chunks lazily, one page at a time, from the shared
//! `max_memory_bytes` budget. Pages are never returned or rebalanced between
//! classes; a freed chunk goes back onto its own class's free list.
//!
//! Chunk slots own the items stored in them (`Arc<Item>`), so the allocator
//! is also the terminal owner that drops an item's memory when its chunk is
//! freed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{CacheConfig, MAX_SLAB_CLASSES};
use crate::error::CacheError;
use crate::item::Item;

/// Location of one chunk: slab class plus index within the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkId {
    pub(crate) class: u8,
    pub(crate) index: u32,
}

/// Per-class usage snapshot for [`Cache::stats`](crate::Cache::stats).
#[derive(Debug, Clone)]
pub(crate) struct ClassUsage {
    pub(crate) chunk_size: usize,
    pub(crate) chunks_used: usize,
    pub(crate) chunks_free: usize,
    pub(crate) pages: usize,
}

/// Mutable side of a slab class: carved chunk slots plus the free list.
#[derive(Debug)]
struct ClassChunks {
    /// One slot per carved chunk; `Some` while the chunk holds a live item.
    slots: Vec<Option<Arc<Item>>>,
    /// Indices of carved-but-unused chunks.
    free: Vec<u32>,
    /// Pages carved so far.
    pages: usize,
}

#[derive(Debug)]
struct SlabClass {
    chunk_size: usize,
    chunks_per_page: usize,
    chunks: Mutex<ClassChunks>,
}

impl SlabClass {
    fn new(chunk_size: usize, page_bytes: usize) -> Self {
        Self {
            chunk_size,
            chunks_per_page: (page_bytes / chunk_size).max(1),
            chunks: Mutex::new(ClassChunks {
                slots: Vec::new(),
                free: Vec::new(),
                pages: 0,
            }),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SlabAllocator {
    classes: Vec<SlabClass>,
    /// Chunk sizes per class, kept separate for binary-search lookup.
    chunk_sizes: Vec<usize>,
    page_bytes: usize,
    max_memory_bytes: usize,
    allocated_bytes: AtomicUsize,
}

/// Rounds up to 8-byte alignment.
fn align8(size: usize) -> usize {
    (size + 7) & !7
}

impl SlabAllocator {
    /// Builds the class table from a validated configuration.
    pub(crate) fn new(config: &CacheConfig) -> Self {
        let max = align8(config.max_chunk_size);
        let mut sizes = Vec::new();
        let mut size = align8(config.min_chunk_size);
        while size < max && sizes.len() < MAX_SLAB_CLASSES - 1 {
            sizes.push(size);
            let grown = align8((size as f64 * config.growth_factor) as usize);
            size = grown.max(size + 8);
        }
        sizes.push(max);

        let classes = sizes
            .iter()
            .map(|&chunk_size| SlabClass::new(chunk_size, config.page_bytes))
            .collect();

        Self {
            classes,
            chunk_sizes: sizes,
            page_bytes: config.page_bytes,
            max_memory_bytes: config.max_memory_bytes,
            allocated_bytes: AtomicUsize::new(0),
        }
    }

    /// Number of slab classes.
    pub(crate) fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Index of the largest active class.
    pub(crate) fn largest_class(&self) -> usize {
        self.classes.len() - 1
    }

    /// Chunk size of the largest class; items above this are rejected.
    pub(crate) fn max_chunk_size(&self) -> usize {
        *self.chunk_sizes.last().expect("at least one slab class")
    }

    /// Bytes carved from the budget so far.
    pub(crate) fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Smallest class whose chunk size covers `total_size`.
    pub(crate) fn class_for(&self, total_size: usize) -> Option<u8> {
        match self.chunk_sizes.binary_search(&total_size) {
            Ok(idx) => Some(idx as u8),
            Err(idx) if idx < self.chunk_sizes.len() => Some(idx as u8),
            Err(_) => None,
        }
    }

    /// Reserves a chunk in `class`, carving a fresh page when the free list
    /// is empty and the budget allows. Never blocks on anything but the
    /// class mutex.
    pub(crate) fn reserve(&self, class: u8) -> Result<ChunkId, CacheError> {
        let slab = &self.classes[class as usize];
        let mut chunks = slab.chunks.lock();

        if let Some(index) = chunks.free.pop() {
            return Ok(ChunkId { class, index });
        }

        // Carve a page: claim budget first so two classes cannot overshoot.
        self.allocated_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used + self.page_bytes <= self.max_memory_bytes)
                    .then_some(used + self.page_bytes)
            })
            .map_err(|_| CacheError::OutOfMemory)?;

        let base = chunks.slots.len() as u32;
        let count = slab.chunks_per_page as u32;
        chunks.slots.extend((0..count).map(|_| None));
        chunks.pages += 1;
        for offset in (1..count).rev() {
            chunks.free.push(base + offset);
        }
        Ok(ChunkId { class, index: base })
    }

    /// Stores `item` into its reserved chunk slot.
    pub(crate) fn commit(&self, chunk: ChunkId, item: Arc<Item>) {
        let mut chunks = self.classes[chunk.class as usize].chunks.lock();
        let slot = &mut chunks.slots[chunk.index as usize];
        assert!(slot.is_none(), "chunk committed twice");
        *slot = Some(item);
    }

    /// Returns a chunk to its class's free list, dropping the stored item.
    ///
    /// Freeing an already-free chunk is a fatal invariant breach.
    pub(crate) fn free(&self, chunk: ChunkId) {
        let mut chunks = self.classes[chunk.class as usize].chunks.lock();
        let taken = chunks.slots[chunk.index as usize].take();
        assert!(taken.is_some(), "chunk double free");
        chunks.free.push(chunk.index);
    }

    /// Per-class usage counters.
    pub(crate) fn class_usage(&self) -> Vec<ClassUsage> {
        self.classes
            .iter()
            .map(|slab| {
                let chunks = slab.chunks.lock();
                let free = chunks.free.len();
                let used = chunks.slots.iter().filter(|slot| slot.is_some()).count();
                ClassUsage {
                    chunk_size: slab.chunk_size,
                    chunks_used: used,
                    chunks_free: free,
                    pages: chunks.pages,
                }
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn chunk_size(&self, class: u8) -> usize {
        self.chunk_sizes[class as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: usize, max: usize, page: usize, budget: usize) -> CacheConfig {
        CacheConfig {
            growth_factor: 1.25,
            min_chunk_size: min,
            max_chunk_size: max,
            page_bytes: page,
            max_memory_bytes: budget,
            ..Default::default()
        }
    }

    fn test_item(alloc: &SlabAllocator, chunk: ChunkId) -> Arc<Item> {
        Arc::new(Item::new(b"k", b"v", 0, 0, chunk, alloc.chunk_size(chunk.class)))
    }

    mod class_table {
        use super::*;

        #[test]
        fn sizes_are_strictly_increasing_and_aligned() {
            let alloc = SlabAllocator::new(&config(96, 1024 * 1024, 1024 * 1024, 8 * 1024 * 1024));
            for pair in alloc.chunk_sizes.windows(2) {
                assert!(pair[0] < pair[1]);
            }
            for &size in &alloc.chunk_sizes {
                assert_eq!(size % 8, 0);
            }
            assert_eq!(alloc.max_chunk_size(), 1024 * 1024);
        }

        #[test]
        fn class_count_is_bounded() {
            // A tiny growth factor would otherwise explode the table.
            let cfg = CacheConfig {
                growth_factor: 1.01,
                ..config(8, 1024 * 1024, 1024 * 1024, 8 * 1024 * 1024)
            };
            let alloc = SlabAllocator::new(&cfg);
            assert!(alloc.class_count() <= MAX_SLAB_CLASSES);
        }

        #[test]
        fn class_for_picks_smallest_covering_class() {
            let alloc = SlabAllocator::new(&config(96, 4096, 4096, 64 * 1024));
            let first = alloc.chunk_sizes[0];
            let second = alloc.chunk_sizes[1];

            assert_eq!(alloc.class_for(1), Some(0));
            assert_eq!(alloc.class_for(first), Some(0));
            assert_eq!(alloc.class_for(first + 1), Some(1));
            assert_eq!(alloc.class_for(second), Some(1));
            assert_eq!(alloc.class_for(4096), Some(alloc.largest_class() as u8));
            assert_eq!(alloc.class_for(4097), None);
        }

        #[test]
        fn single_class_when_min_equals_max() {
            let alloc = SlabAllocator::new(&config(256, 256, 1024, 4096));
            assert_eq!(alloc.class_count(), 1);
            assert_eq!(alloc.largest_class(), 0);
        }
    }

    mod chunk_lifecycle {
        use super::*;

        #[test]
        fn reserve_carves_a_page_and_accounts_bytes() {
            let alloc = SlabAllocator::new(&config(256, 256, 1024, 4096));
            assert_eq!(alloc.allocated_bytes(), 0);

            let chunk = alloc.reserve(0).unwrap();
            assert_eq!(alloc.allocated_bytes(), 1024);

            // 1024 / 256 = 4 chunks on the page; three more reserves succeed
            // without carving another page.
            for _ in 0..3 {
                alloc.reserve(0).unwrap();
            }
            assert_eq!(alloc.allocated_bytes(), 1024);
            assert_eq!(chunk.class, 0);
        }

        #[test]
        fn budget_exhaustion_is_out_of_memory() {
            let alloc = SlabAllocator::new(&config(256, 256, 1024, 1024));
            for _ in 0..4 {
                alloc.reserve(0).unwrap();
            }
            assert_eq!(alloc.reserve(0), Err(CacheError::OutOfMemory));
        }

        #[test]
        fn free_recycles_the_chunk_index() {
            let alloc = SlabAllocator::new(&config(256, 256, 1024, 1024));
            let chunk = alloc.reserve(0).unwrap();
            alloc.commit(chunk, test_item(&alloc, chunk));

            for _ in 0..3 {
                alloc.reserve(0).unwrap();
            }
            assert!(alloc.reserve(0).is_err());

            alloc.free(chunk);
            let again = alloc.reserve(0).unwrap();
            assert_eq!(again.index, chunk.index);
        }

        #[test]
        #[should_panic(expected = "chunk double free")]
        fn double_free_is_fatal() {
            let alloc = SlabAllocator::new(&config(256, 256, 1024, 1024));
            let chunk = alloc.reserve(0).unwrap();
            alloc.commit(chunk, test_item(&alloc, chunk));
            alloc.free(chunk);
            alloc.free(chunk);
        }

        #[test]
        fn usage_counts_used_and_free_chunks() {
            let alloc = SlabAllocator::new(&config(256, 256, 1024, 2048));
            let a = alloc.reserve(0).unwrap();
            alloc.commit(a, test_item(&alloc, a));
            let _b = alloc.reserve(0).unwrap(); // reserved, never committed

            let usage = &alloc.class_usage()[0];
            assert_eq!(usage.chunk_size, 256);
            assert_eq!(usage.chunks_used, 1);
            assert_eq!(usage.chunks_free, 2);
            assert_eq!(usage.pages, 1);
        }
    }
}
