//! Arena-indexed building blocks used by the LRU segments.

pub mod arena;
pub mod list;

pub use arena::{SlotArena, SlotId};
pub use list::OrderList;
