//! Cache items and their lifecycle.
//!
//! An item moves through two orthogonal state machines:
//!
//! * Life: `USED -> FREED`, one way, flipped by compare-and-swap so that
//!   concurrent removals of the same item unlink it exactly once. The chunk
//!   is physically released only when the item is `FREED` *and* its
//!   reference count has dropped to zero.
//! * Access: `UNSEEN -> FETCHED -> ACTIVE`, advanced one step per `bump`.
//!   An item must be observed twice before it is treated as genuinely hot;
//!   a single touch never promotes it out of the cold tier.
//!
//! Reference counting is manual: `find` hands out a counted reference and
//! the caller must `release` it. Underflow and use-after-free are program
//! bugs and abort via `assert!` rather than being reported as errors.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::lru::{Temperature, NODE_NONE, SEG_NEVER, SEG_NONE};
use crate::slab::ChunkId;

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 255;

const LIFE_USED: u8 = 1;
const LIFE_FREED: u8 = 2;

/// How recently and how often an item has been observed.
///
/// Advanced one step per [`Cache::bump`](crate::Cache::bump).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccessState {
    /// Allocated but never bumped.
    Unseen = 0,
    /// Bumped once.
    Fetched = 1,
    /// Bumped at least twice; promoted out of the cold tier.
    Active = 2,
}

impl AccessState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => AccessState::Unseen,
            1 => AccessState::Fetched,
            _ => AccessState::Active,
        }
    }
}

/// One cached entry. Owned by its slab chunk; shared with the hash bucket
/// chain, its LRU segment, and any outstanding [`ItemHandle`]s.
pub(crate) struct Item {
    key: Box<[u8]>,
    value: Box<[u8]>,
    /// Precomputed key hash; bucket chains compare this before the key bytes.
    pub(crate) hash: u64,
    /// Absolute expiry in seconds; 0 means never expire.
    pub(crate) expire_at: u64,
    /// Slab chunk backing this item.
    pub(crate) chunk: ChunkId,
    /// Accounted size: header plus key plus value.
    pub(crate) total_size: usize,

    ref_count: AtomicU32,
    life: AtomicU8,
    access: AtomicU8,
    /// Whether the item is currently reachable through the hash table.
    in_table: AtomicBool,
    /// Last observation time, maintained by `bump`; the demotion sweep
    /// compares it against the staleness cutoff.
    pub(crate) last_access: AtomicU64,
    /// Packed LRU segment index, `SEG_NONE` when unlinked.
    seg: AtomicU32,
    /// Node id inside the segment's order list.
    node: AtomicU32,
}

impl Item {
    pub(crate) fn new(
        key: &[u8],
        value: &[u8],
        hash: u64,
        expire_at: u64,
        chunk: ChunkId,
        total_size: usize,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            hash,
            expire_at,
            chunk,
            total_size,
            // The allocating caller holds the first reference.
            ref_count: AtomicU32::new(1),
            life: AtomicU8::new(LIFE_USED),
            access: AtomicU8::new(AccessState::Unseen as u8),
            in_table: AtomicBool::new(false),
            last_access: AtomicU64::new(0),
            seg: AtomicU32::new(SEG_NONE),
            node: AtomicU32::new(NODE_NONE),
        }
    }

    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }

    pub(crate) fn value(&self) -> &[u8] {
        &self.value
    }

    pub(crate) fn is_expired(&self, now: u64) -> bool {
        self.expire_at != 0 && self.expire_at <= now
    }

    pub(crate) fn incr_ref(&self) {
        let prev = self.ref_count.fetch_add(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "reviving an item with zero references");
    }

    /// Drops one reference and returns the remaining count.
    pub(crate) fn decr_ref(&self) -> u32 {
        let prev = self.ref_count.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "item reference count underflow");
        prev - 1
    }

    #[cfg(test)]
    pub(crate) fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }

    pub(crate) fn is_used(&self) -> bool {
        self.life.load(Ordering::Acquire) == LIFE_USED
    }

    /// Flips `USED -> FREED`. Returns `false` if another caller got there
    /// first, making unlink idempotent under concurrent removal.
    pub(crate) fn mark_freed(&self) -> bool {
        self.life
            .compare_exchange(LIFE_USED, LIFE_FREED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn access_state(&self) -> AccessState {
        AccessState::from_u8(self.access.load(Ordering::Acquire))
    }

    /// Single-step access transition; fails if a concurrent bump moved the
    /// state first.
    pub(crate) fn transition_access(&self, from: AccessState, to: AccessState) -> bool {
        self.access
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn note_access(&self, now: u64) {
        self.last_access.store(now, Ordering::Relaxed);
    }

    pub(crate) fn set_in_table(&self) {
        self.in_table.store(true, Ordering::Release);
    }

    /// Clears the table flag, returning whether it was set.
    pub(crate) fn clear_in_table(&self) -> bool {
        self.in_table.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn in_table(&self) -> bool {
        self.in_table.load(Ordering::Acquire)
    }

    /// Current (segment, node) position, `SEG_NONE`/`NODE_NONE` when unlinked.
    pub(crate) fn list_pos(&self) -> (u32, u32) {
        (self.seg.load(Ordering::Acquire), self.node.load(Ordering::Acquire))
    }

    pub(crate) fn set_list_pos(&self, seg: u32, node: u32) {
        self.node.store(node, Ordering::Release);
        self.seg.store(seg, Ordering::Release);
    }

    pub(crate) fn clear_list_pos(&self) {
        self.seg.store(SEG_NONE, Ordering::Release);
        self.node.store(NODE_NONE, Ordering::Release);
    }
}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Item")
            .field("key_len", &self.key.len())
            .field("value_len", &self.value.len())
            .field("expire_at", &self.expire_at)
            .field("chunk", &self.chunk)
            .field("ref_count", &self.ref_count.load(Ordering::Relaxed))
            .field("access", &self.access_state())
            .finish()
    }
}

/// Accounted size of an item: header plus key plus value bytes.
pub(crate) fn item_total_size(key_len: usize, value_len: usize) -> usize {
    std::mem::size_of::<Item>() + key_len + value_len
}

/// Counted reference to a cached item.
///
/// Handed out by [`Cache::allocate`](crate::Cache::allocate) and
/// [`Cache::find`](crate::Cache::find); every handle must be returned via
/// [`Cache::release`](crate::Cache::release) or [`Cache::bump`](crate::Cache::bump),
/// which consume it. Dropping a handle without releasing it leaks the
/// reference and pins the chunk forever.
#[must_use = "handles pin their chunk until released through the cache"]
#[derive(Debug)]
pub struct ItemHandle {
    pub(crate) item: Arc<Item>,
}

impl ItemHandle {
    /// The item's key bytes.
    pub fn key(&self) -> &[u8] {
        self.item.key()
    }

    /// The item's value bytes.
    pub fn value(&self) -> &[u8] {
        self.item.value()
    }

    /// Absolute expiry in seconds, 0 for never.
    pub fn expire_at(&self) -> u64 {
        self.item.expire_at
    }

    /// Current access state.
    pub fn access_state(&self) -> AccessState {
        self.item.access_state()
    }

    /// Which LRU tier the item currently sits in, or `None` when the item is
    /// unlinked or on the never-expire list.
    pub fn temperature(&self) -> Option<Temperature> {
        let (seg, _) = self.item.list_pos();
        if seg == SEG_NONE || seg == SEG_NEVER {
            return None;
        }
        Some(crate::lru::unpack_seg(seg).1)
    }
}
