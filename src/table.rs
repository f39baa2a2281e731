//! Hash index: fixed bucket array with per-bucket chains.
//!
//! Buckets are never resized; collisions chain in a `Vec` and are resolved
//! by comparing the precomputed hash before the key bytes. Each bucket has
//! its own mutex, and the bucket lock is the outermost lock in the cache:
//! it is taken before any segment or class lock, never the other way
//! around.

use std::hash::Hasher;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHasher;

use crate::item::Item;

pub(crate) struct HashTable {
    buckets: Vec<Mutex<Vec<Arc<Item>>>>,
    mask: u64,
}

impl HashTable {
    pub(crate) fn new(bucket_count: usize) -> Self {
        let count = bucket_count.next_power_of_two();
        let buckets = (0..count).map(|_| Mutex::new(Vec::new())).collect();
        Self {
            buckets,
            mask: (count - 1) as u64,
        }
    }

    pub(crate) fn hash_key(key: &[u8]) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write(key);
        hasher.finish()
    }

    /// The bucket owning `hash`.
    pub(crate) fn bucket(&self, hash: u64) -> &Mutex<Vec<Arc<Item>>> {
        &self.buckets[(hash & self.mask) as usize]
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
