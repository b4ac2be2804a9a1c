//! Fixed-Capacity Free Lists
//!
//! Pointer-free linked structures over pre-allocated arenas, linked by
//! integer indices instead of pointers.
//!
//! ## Responsibilities
//! - [`SlotPool`]: O(1) acquire/release of indices from a LIFO free list.
//!   Backs the key index's node arena.
//! - [`SlotGroupTracker`]: a fixed set of indices partitioned into named
//!   groups (idle/used for grid files), with O(1) moves between groups
//!   and forward iteration of a group. One instance per open data file.
//!
//! Neither structure allocates after construction.

mod slot_pool;
mod group_tracker;

pub use slot_pool::SlotPool;
pub use group_tracker::{GroupIter, SlotGroupTracker};
