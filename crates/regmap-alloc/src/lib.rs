//! Address allocation for expanded regmap config trees.
//!
//! Assigns every enabled module a contiguous, non-overlapping byte range:
//! first-fit placement for auto modules against per-section and global
//! occupancy masks, then submodule packing inside each base module's
//! reserved descendant space, in parent-first order.

mod allocator;
mod error;
mod mask;

pub use allocator::{assign_addresses, Allocation, AllocatorConfig};
pub use error::{AllocError, Result};
pub use mask::{align_up, find_free, OccupancyMask};
