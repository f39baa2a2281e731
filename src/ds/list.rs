//! Ordered doubly linked list backed by a [`SlotArena`].
//!
//! Nodes live in the arena and link to each other by [`SlotId`], so a list
//! position can be recorded outside the list (an item remembers its own node
//! id) and unlinked in O(1) without pointer chasing.
//!
//! ```text
//!   head ─► [id_1] ◄──► [id_2] ◄──► [id_3] ◄── tail
//!   front = most recently linked        back = oldest
//! ```
//!
//! `push_front` / `pop_back` / `remove(id)` are all O(1); this is the shape
//! every LRU segment needs: head insertion on link, tail scans for eviction,
//! arbitrary unlink on removal.
//!
//! `debug_validate()` is available in debug/test builds.

use crate::ds::arena::{SlotArena, SlotId};

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

/// Doubly linked list whose nodes are stored in a [`SlotArena`].
#[derive(Debug)]
pub struct OrderList<T> {
    arena: SlotArena<Node<T>>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
}

impl<T> OrderList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            arena: SlotArena::new(),
            head: None,
            tail: None,
        }
    }

    /// Returns the number of nodes in the list.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Returns `true` if `id` names a live node of this list.
    pub fn contains(&self, id: SlotId) -> bool {
        self.arena.contains(id)
    }

    /// Returns the value stored at `id`, if present.
    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.arena.get(id).map(|node| &node.value)
    }

    /// Returns the node id at the front (most recently linked).
    pub fn front_id(&self) -> Option<SlotId> {
        self.head
    }

    /// Returns the node id at the back (oldest).
    pub fn back_id(&self) -> Option<SlotId> {
        self.tail
    }

    /// Returns the id of the node one step closer to the front.
    pub fn prev_id(&self, id: SlotId) -> Option<SlotId> {
        self.arena.get(id).and_then(|node| node.prev)
    }

    /// Inserts a value at the front and returns its node id.
    pub fn push_front(&mut self, value: T) -> SlotId {
        let id = self.arena.insert(Node {
            value,
            prev: None,
            next: self.head,
        });
        match self.head {
            Some(head) => {
                if let Some(node) = self.arena.get_mut(head) {
                    node.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        id
    }

    /// Removes and returns the back (oldest) value.
    pub fn pop_back(&mut self) -> Option<T> {
        let id = self.tail?;
        self.remove(id)
    }

    /// Removes the node `id` and returns its value.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let (prev, next) = {
            let node = self.arena.get(id)?;
            (node.prev, node.next)
        };

        match prev {
            Some(prev_id) => {
                if let Some(prev_node) = self.arena.get_mut(prev_id) {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next_id) => {
                if let Some(next_node) = self.arena.get_mut(next_id) {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        self.arena.remove(id).map(|node| node.value)
    }

    /// Removes all nodes.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.head = None;
        self.tail = None;
    }

    /// Iterates values from front (newest) to back (oldest).
    pub fn iter(&self) -> OrderListIter<'_, T> {
        OrderListIter {
            list: self,
            current: self.head,
        }
    }

    /// Walks the chain from both ends, asserting link symmetry and that the
    /// reachable node count matches the arena population.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate(&self) {
        let mut count = 0;
        let mut prev: Option<SlotId> = None;
        let mut current = self.head;
        while let Some(id) = current {
            let node = self.arena.get(id).expect("linked node missing from arena");
            assert_eq!(node.prev, prev, "prev link mismatch at {id:?}");
            prev = Some(id);
            current = node.next;
            count += 1;
            assert!(count <= self.arena.len(), "cycle detected in list");
        }
        assert_eq!(self.tail, prev, "tail does not match last reachable node");
        assert_eq!(count, self.arena.len(), "unreachable nodes in arena");
    }
}

impl<T> Default for OrderList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Front-to-back iterator over an [`OrderList`].
pub struct OrderListIter<'a, T> {
    list: &'a OrderList<T>,
    current: Option<SlotId>,
}

impl<'a, T> Iterator for OrderListIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let node = self.list.arena.get(id)?;
        self.current = node.next;
        Some(&node.value)
    }
}
