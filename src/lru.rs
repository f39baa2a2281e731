//! Segmented LRU: three temperature tiers per slab class plus one shared
//! never-expire list.
//!
//! Each slab class owns a HOT, WARM and COLD [`OrderList`]; eviction only
//! ever inspects the COLD tail, then the WARM tail. HOT items are immune.
//! Items that never expire live on a single global list that no eviction or
//! sweep path touches.
//!
//! Every segment has its own mutex. An item records its packed segment index
//! and node id in atomics so it can be unlinked in O(1); those fields are
//! only written while the owning segment lock is held.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::ds::{OrderList, SlotId};
use crate::item::Item;

/// LRU tier within a slab class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Temperature {
    /// Promoted twice-observed items; never scanned by eviction.
    Hot = 0,
    /// Demoted from hot, or promoted from cold; evicted after cold drains.
    Warm = 1,
    /// New and stale items; first in line for eviction.
    Cold = 2,
}

/// Item is not on any list.
pub(crate) const SEG_NONE: u32 = u32::MAX;
/// Item is on the never-expire list.
pub(crate) const SEG_NEVER: u32 = u32::MAX - 1;
/// No node id recorded.
pub(crate) const NODE_NONE: u32 = u32::MAX;

/// Packs a (class, temperature) pair into one segment index.
pub(crate) fn pack_seg(class: u8, temp: Temperature) -> u32 {
    ((class as u32) << 2) | temp as u32
}

pub(crate) fn unpack_seg(seg: u32) -> (u8, Temperature) {
    let temp = match seg & 0b11 {
        0 => Temperature::Hot,
        1 => Temperature::Warm,
        _ => Temperature::Cold,
    };
    ((seg >> 2) as u8, temp)
}

/// All ordered lists of the cache: `class_count * 3` tier segments plus the
/// never-expire list.
pub(crate) struct LruArray {
    segments: Vec<Mutex<OrderList<Arc<Item>>>>,
    never: Mutex<OrderList<Arc<Item>>>,
}

impl LruArray {
    pub(crate) fn new(class_count: usize) -> Self {
        let segments = (0..class_count * 3)
            .map(|_| Mutex::new(OrderList::new()))
            .collect();
        Self {
            segments,
            never: Mutex::new(OrderList::new()),
        }
    }

    fn list(&self, seg: u32) -> &Mutex<OrderList<Arc<Item>>> {
        if seg == SEG_NEVER {
            &self.never
        } else {
            let (class, temp) = unpack_seg(seg);
            &self.segments[class as usize * 3 + temp as usize]
        }
    }

    /// Links `item` at the front of segment `seg` and records its position.
    ///
    /// The item must not already be on a list.
    pub(crate) fn link(&self, seg: u32, item: &Arc<Item>) {
        let (current, _) = item.list_pos();
        assert_eq!(current, SEG_NONE, "item is already linked to a list");

        let mut list = self.list(seg).lock();
        let node = list.push_front(Arc::clone(item));
        item.set_list_pos(seg, node.index());
    }

    /// Removes `item` from whatever segment it is on.
    ///
    /// The caller must prevent concurrent relinks (hold the item's bucket
    /// lock, or know the item is not yet published).
    pub(crate) fn unlink(&self, item: &Arc<Item>) {
        let (seg, node) = item.list_pos();
        assert_ne!(seg, SEG_NONE, "item is not linked to any list");

        let mut list = self.list(seg).lock();
        let removed = list
            .remove(SlotId(node))
            .expect("linked item missing from its list");
        assert!(
            Arc::ptr_eq(&removed, item),
            "list node does not belong to this item"
        );
        item.clear_list_pos();
    }

    /// Oldest eviction candidate for `class`: the COLD tail, falling back to
    /// the WARM tail. HOT and never-expire items are never candidates.
    pub(crate) fn evict_candidate(&self, class: u8) -> Option<Arc<Item>> {
        for temp in [Temperature::Cold, Temperature::Warm] {
            let list = self.list(pack_seg(class, temp)).lock();
            if let Some(id) = list.back_id() {
                return list.get(id).map(Arc::clone);
            }
        }
        None
    }

    /// Items in (`class`, `temp`) whose last access is at or before `cutoff`,
    /// oldest first, up to `max`.
    pub(crate) fn stale_candidates(
        &self,
        class: u8,
        temp: Temperature,
        cutoff: u64,
        max: usize,
    ) -> Vec<Arc<Item>> {
        let list = self.list(pack_seg(class, temp)).lock();
        let mut out = Vec::new();
        let mut cursor = list.back_id();
        while let Some(id) = cursor {
            if out.len() == max {
                break;
            }
            if let Some(item) = list.get(id) {
                // Recently bumped items sit anywhere in the list, so the
                // walk does not stop at the first fresh one.
                if item.last_access.load(std::sync::atomic::Ordering::Relaxed) <= cutoff {
                    out.push(Arc::clone(item));
                }
            }
            cursor = list.prev_id(id);
        }
        out
    }

    pub(crate) fn tier_len(&self, class: u8, temp: Temperature) -> usize {
        self.list(pack_seg(class, temp)).lock().len()
    }

    pub(crate) fn never_len(&self) -> usize {
        self.never.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::ChunkId;

    fn test_item(key: &[u8], last_access: u64) -> Arc<Item> {
        let chunk = ChunkId { class: 0, index: 0 };
        let it = Item::new(key, b"v", 0, 0, chunk, 128);
        it.note_access(last_access);
        Arc::new(it)
    }

    #[test]
    fn seg_packing_round_trips() {
        for class in [0u8, 1, 7, 63] {
            for temp in [Temperature::Hot, Temperature::Warm, Temperature::Cold] {
                assert_eq!(unpack_seg(pack_seg(class, temp)), (class, temp));
            }
        }
    }

    #[test]
    fn link_records_position_and_unlink_clears_it() {
        let lru = LruArray::new(2);
        let item = test_item(b"a", 0);

        lru.link(pack_seg(1, Temperature::Hot), &item);
        let (seg, node) = item.list_pos();
        assert_eq!(seg, pack_seg(1, Temperature::Hot));
        assert_ne!(node, NODE_NONE);
        assert_eq!(lru.tier_len(1, Temperature::Hot), 1);

        lru.unlink(&item);
        assert_eq!(item.list_pos(), (SEG_NONE, NODE_NONE));
        assert_eq!(lru.tier_len(1, Temperature::Hot), 0);
    }

    #[test]
    #[should_panic(expected = "item is already linked to a list")]
    fn double_link_is_fatal() {
        let lru = LruArray::new(1);
        let item = test_item(b"a", 0);
        lru.link(pack_seg(0, Temperature::Cold), &item);
        lru.link(pack_seg(0, Temperature::Hot), &item);
    }

    #[test]
    #[should_panic(expected = "item is not linked to any list")]
    fn unlink_of_unlinked_item_is_fatal() {
        let lru = LruArray::new(1);
        let item = test_item(b"a", 0);
        lru.unlink(&item);
    }

    #[test]
    fn evict_candidate_prefers_cold_tail() {
        let lru = LruArray::new(1);
        let cold_old = test_item(b"cold-old", 0);
        let cold_new = test_item(b"cold-new", 0);
        let warm = test_item(b"warm", 0);
        let hot = test_item(b"hot", 0);

        lru.link(pack_seg(0, Temperature::Cold), &cold_old);
        lru.link(pack_seg(0, Temperature::Cold), &cold_new);
        lru.link(pack_seg(0, Temperature::Warm), &warm);
        lru.link(pack_seg(0, Temperature::Hot), &hot);

        let candidate = lru.evict_candidate(0).unwrap();
        assert!(Arc::ptr_eq(&candidate, &cold_old));
    }

    #[test]
    fn evict_candidate_falls_back_to_warm_then_none() {
        let lru = LruArray::new(1);
        let warm = test_item(b"warm", 0);
        let hot = test_item(b"hot", 0);
        lru.link(pack_seg(0, Temperature::Warm), &warm);
        lru.link(pack_seg(0, Temperature::Hot), &hot);

        let candidate = lru.evict_candidate(0).unwrap();
        assert!(Arc::ptr_eq(&candidate, &warm));

        lru.unlink(&warm);
        assert!(lru.evict_candidate(0).is_none(), "hot tier is immune");
    }

    #[test]
    fn never_expire_items_are_not_candidates() {
        let lru = LruArray::new(1);
        let item = test_item(b"pinned", 0);
        lru.link(SEG_NEVER, &item);

        assert_eq!(lru.never_len(), 1);
        assert!(lru.evict_candidate(0).is_none());
    }

    #[test]
    fn stale_candidates_skip_fresh_items_mid_list() {
        let lru = LruArray::new(1);
        let stale_a = test_item(b"a", 10);
        let fresh = test_item(b"b", 100);
        let stale_c = test_item(b"c", 20);

        // Linked newest-first, so list order front-to-back is c, b, a.
        lru.link(pack_seg(0, Temperature::Hot), &stale_a);
        lru.link(pack_seg(0, Temperature::Hot), &fresh);
        lru.link(pack_seg(0, Temperature::Hot), &stale_c);

        let found = lru.stale_candidates(0, Temperature::Hot, 50, 8);
        assert_eq!(found.len(), 2);
        assert!(Arc::ptr_eq(&found[0], &stale_a));
        assert!(Arc::ptr_eq(&found[1], &stale_c));
    }

    #[test]
    fn stale_candidates_respect_the_limit() {
        let lru = LruArray::new(1);
        for i in 0..5 {
            let item = test_item(format!("k{i}").as_bytes(), 0);
            lru.link(pack_seg(0, Temperature::Warm), &item);
        }
        assert_eq!(lru.stale_candidates(0, Temperature::Warm, 50, 3).len(), 3);
    }
}
