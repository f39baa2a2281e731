//! The cache facade: ties the slab allocator, hash index and segmented LRU
//! together and enforces the item lifecycle across them.
//!
//! Locking discipline, outermost first:
//!
//! 1. bucket lock (hash index)
//! 2. segment lock (LRU order list)
//! 3. class mutex (slab free list)
//!
//! No path takes two bucket locks or two segment locks at once. Reference
//! counts move outside any lock on the hot path; the bucket lock is only
//! taken for insert/remove/promotion and for the expiry check in `find`.

use std::sync::Arc;

use crate::config::CacheConfig;
use crate::error::{CacheError, ConfigError};
use crate::item::{item_total_size, AccessState, Item, ItemHandle, MAX_KEY_LEN};
use crate::lru::{pack_seg, unpack_seg, LruArray, Temperature, SEG_NEVER, SEG_NONE};
use crate::slab::{ChunkId, SlabAllocator};
use crate::stats::{CacheStats, ClassStats};
use crate::table::HashTable;

/// Stale items relabeled per (class, tier) in one sweep pass.
const SWEEP_BATCH: usize = 64;

/// Fixed-capacity object cache with slab-backed storage and segmented
/// (hot/warm/cold) LRU eviction.
///
/// All methods take `&self`; a `Cache` is shared across threads behind an
/// `Arc`. Time is supplied by the caller as seconds (`now`), so the cache
/// itself never reads a clock.
pub struct Cache {
    allocator: SlabAllocator,
    table: HashTable,
    lru: LruArray,
    config: CacheConfig,
}

impl Cache {
    /// Builds a cache from `config`. Slab classes, the page budget and the
    /// bucket array are fixed here and never resized.
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let allocator = SlabAllocator::new(&config);
        let lru = LruArray::new(allocator.class_count());
        let table = HashTable::new(config.table_bucket_count);
        Ok(Self {
            allocator,
            table,
            lru,
            config,
        })
    }

    /// Allocates an item sized for `key` and `value` and links it into the
    /// LRU: the never-expire list when `expire_at == 0`, otherwise the HOT
    /// tier of its slab class.
    ///
    /// The returned handle owns one reference and must be passed to
    /// [`insert`](Self::insert) to make the item findable, or consumed via
    /// [`release`](Self::release) only after the item has been removed.
    ///
    /// When the item's class is exhausted, an eviction scan reclaims COLD
    /// then WARM tail items before giving up with `OutOfMemory`.
    pub fn allocate(
        &self,
        key: &[u8],
        value: &[u8],
        expire_at: u64,
    ) -> Result<ItemHandle, CacheError> {
        if key.len() > MAX_KEY_LEN {
            return Err(CacheError::KeyTooLong { len: key.len() });
        }
        let total = item_total_size(key.len(), value.len());
        let class = self
            .allocator
            .class_for(total)
            .ok_or(CacheError::ValueTooLarge {
                size: total,
                max: self.allocator.max_chunk_size(),
            })?;

        let chunk = self.reserve_with_eviction(class)?;
        let hash = HashTable::hash_key(key);
        let item = Arc::new(Item::new(key, value, hash, expire_at, chunk, total));
        self.allocator.commit(chunk, Arc::clone(&item));

        let seg = if expire_at == 0 {
            SEG_NEVER
        } else {
            pack_seg(chunk.class, Temperature::Hot)
        };
        self.lru.link(seg, &item);

        Ok(ItemHandle { item })
    }

    /// [`allocate`](Self::allocate) with `now + default_expire_secs` as the
    /// expiry deadline.
    pub fn allocate_with_default_ttl(
        &self,
        key: &[u8],
        value: &[u8],
        now: u64,
    ) -> Result<ItemHandle, CacheError> {
        let expire_at = now.saturating_add(self.config.default_expire_secs);
        self.allocate(key, value, expire_at)
    }

    /// Commits an allocated item into the keyed index, consuming the
    /// handle's reference; the index owns it from here on. An existing item
    /// under the same key is unlinked first.
    pub fn insert(&self, handle: ItemHandle) {
        let item = handle.item;
        let mut chain = self.table.bucket(item.hash).lock();
        let existing = chain
            .iter()
            .find(|c| c.hash == item.hash && c.key() == item.key())
            .map(Arc::clone);
        if let Some(existing) = existing {
            self.unlink_locked(&mut chain, &existing);
        }
        item.set_in_table();
        chain.push(item);
    }

    /// Looks up `key`, returning a counted reference on a hit. An item whose
    /// deadline has passed is unlinked on the spot and reported as absent.
    pub fn find(&self, key: &[u8], now: u64) -> Option<ItemHandle> {
        let hash = HashTable::hash_key(key);
        let mut chain = self.table.bucket(hash).lock();
        let item = chain
            .iter()
            .find(|c| c.hash == hash && c.key() == key)
            .map(Arc::clone)?;

        if item.is_expired(now) {
            self.unlink_locked(&mut chain, &item);
            return None;
        }
        item.incr_ref();
        Some(ItemHandle { item })
    }

    /// Unlinks `key` from the index. In-flight readers keep their payload;
    /// the chunk is released once the last of them lets go.
    pub fn remove(&self, key: &[u8]) -> Result<(), CacheError> {
        let hash = HashTable::hash_key(key);
        let mut chain = self.table.bucket(hash).lock();
        let item = chain
            .iter()
            .find(|c| c.hash == hash && c.key() == key)
            .map(Arc::clone)
            .ok_or(CacheError::KeyNotFound)?;
        self.unlink_locked(&mut chain, &item);
        Ok(())
    }

    /// Records an access and consumes the handle's reference.
    ///
    /// State rules, applied in order:
    ///
    /// 1. `ACTIVE`: no change.
    /// 2. `UNSEEN`: becomes `FETCHED`; no list movement, a single access
    ///    does not prove the item hot.
    /// 3. `FETCHED`: becomes `ACTIVE` and records `now`. Only an item
    ///    sitting in the COLD tier moves, relinking to WARM under its
    ///    bucket lock; HOT/WARM accesses never touch a list.
    pub fn bump(&self, handle: ItemHandle, now: u64) {
        let item = handle.item;
        match item.access_state() {
            AccessState::Active => {}
            AccessState::Unseen => {
                item.transition_access(AccessState::Unseen, AccessState::Fetched);
            }
            AccessState::Fetched => {
                if item.transition_access(AccessState::Fetched, AccessState::Active) {
                    item.note_access(now);
                    self.promote_if_cold(&item);
                }
            }
        }
        self.drop_ref(&item);
    }

    /// Drops a reference obtained from [`allocate`](Self::allocate) or
    /// [`find`](Self::find).
    pub fn release(&self, handle: ItemHandle) {
        self.drop_ref(&handle.item);
    }

    /// Relabels items in the HOT and WARM tiers whose last access is at or
    /// before `now - staleness_secs` down to COLD, making them eligible for
    /// eviction. Returns the number of items demoted.
    ///
    /// Meant to be driven periodically by the embedding process; the cache
    /// has no timer of its own. Never-expire items are not touched.
    pub fn sweep(&self, now: u64) -> usize {
        let cutoff = now.saturating_sub(self.config.staleness_secs);
        let mut demoted = 0;

        for class in 0..self.allocator.class_count() as u8 {
            for temp in [Temperature::Hot, Temperature::Warm] {
                for item in self.lru.stale_candidates(class, temp, cutoff, SWEEP_BATCH) {
                    let chain = self.table.bucket(item.hash).lock();
                    // Re-check under the bucket lock: the item may have been
                    // removed, promoted or already demoted since the scan.
                    let (seg, _) = item.list_pos();
                    let stale = item.last_access.load(std::sync::atomic::Ordering::Relaxed)
                        <= cutoff;
                    if item.is_used()
                        && item.in_table()
                        && seg == pack_seg(class, temp)
                        && stale
                    {
                        self.lru.unlink(&item);
                        self.lru.link(pack_seg(class, Temperature::Cold), &item);
                        demoted += 1;
                    }
                    drop(chain);
                }
            }
        }
        demoted
    }

    /// Point-in-time usage counters.
    pub fn stats(&self) -> CacheStats {
        let classes = self
            .allocator
            .class_usage()
            .into_iter()
            .enumerate()
            .map(|(class, usage)| ClassStats {
                chunk_size: usage.chunk_size,
                chunks_used: usage.chunks_used,
                chunks_free: usage.chunks_free,
                pages: usage.pages,
                hot: self.lru.tier_len(class as u8, Temperature::Hot),
                warm: self.lru.tier_len(class as u8, Temperature::Warm),
                cold: self.lru.tier_len(class as u8, Temperature::Cold),
            })
            .collect();

        CacheStats {
            allocated_bytes: self.allocator.allocated_bytes(),
            largest_class: self.allocator.largest_class(),
            never_expire_items: self.lru.never_len(),
            classes,
        }
    }

    /// Reserves a chunk, running the eviction scan when the class is
    /// exhausted: COLD tail first, then WARM, at most `max_eviction_scan`
    /// candidates before reporting `OutOfMemory`.
    fn reserve_with_eviction(&self, class: u8) -> Result<ChunkId, CacheError> {
        if let Ok(chunk) = self.allocator.reserve(class) {
            return Ok(chunk);
        }
        for _ in 0..self.config.max_eviction_scan {
            let Some(victim) = self.lru.evict_candidate(class) else {
                break;
            };
            {
                let mut chain = self.table.bucket(victim.hash).lock();
                // An allocated-but-not-yet-inserted item can surface as a
                // tail candidate; it is not ours to reclaim.
                if victim.in_table() {
                    self.unlink_locked(&mut chain, &victim);
                }
            }
            if let Ok(chunk) = self.allocator.reserve(class) {
                return Ok(chunk);
            }
        }
        Err(CacheError::OutOfMemory)
    }

    /// Moves an ACTIVE item out of the COLD tier. Takes the bucket lock to
    /// serialize against unlink and the demotion sweep.
    fn promote_if_cold(&self, item: &Arc<Item>) {
        let (seg, _) = item.list_pos();
        if seg == SEG_NONE || seg == SEG_NEVER {
            return;
        }
        let (class, temp) = unpack_seg(seg);
        if temp != Temperature::Cold {
            return;
        }

        let chain = self.table.bucket(item.hash).lock();
        let (seg, _) = item.list_pos();
        if item.is_used() && seg == pack_seg(class, Temperature::Cold) {
            self.lru.unlink(item);
            self.lru.link(pack_seg(class, Temperature::Warm), item);
        }
        drop(chain);
    }

    /// Removes `item` from the bucket chain and its LRU list, dropping the
    /// index's reference. Idempotent: the `USED -> FREED` flip is a CAS, so
    /// exactly one of several concurrent unlinkers does the work.
    ///
    /// Caller holds the bucket lock for `item.hash`.
    fn unlink_locked(&self, chain: &mut Vec<Arc<Item>>, item: &Arc<Item>) {
        if !item.mark_freed() {
            return;
        }
        assert!(
            item.clear_in_table(),
            "unlinking an item that is not in the index"
        );
        let pos = chain
            .iter()
            .position(|c| Arc::ptr_eq(c, item))
            .expect("indexed item missing from bucket chain");
        chain.swap_remove(pos);
        self.lru.unlink(item);
        self.drop_ref(item);
    }

    /// Drops one manual reference; the chunk is returned to its slab class
    /// when the count reaches zero on an already-FREED item. Reaching zero
    /// while the item is still live is a corruption and aborts.
    fn drop_ref(&self, item: &Arc<Item>) {
        if item.decr_ref() == 0 {
            assert!(
                !item.is_used(),
                "releasing the last reference to a live item"
            );
            self.allocator.free(item.chunk);
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("allocated_bytes", &self.allocator.allocated_bytes())
            .field("classes", &self.allocator.class_count())
            .field("buckets", &self.table.bucket_count())
            .finish()
    }
}
