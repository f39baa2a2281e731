//! slabcache: a fixed-capacity, slab-backed object cache with segmented
//! (hot/warm/cold) LRU eviction.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod config;
pub mod ds;
pub mod error;
pub mod stats;

mod cache;
mod item;
mod lru;
mod slab;
mod table;

pub use cache::Cache;
pub use config::CacheConfig;
pub use error::{CacheError, ConfigError};
pub use item::{AccessState, ItemHandle, MAX_KEY_LEN};
pub use lru::Temperature;
pub use stats::{CacheStats, ClassStats};
