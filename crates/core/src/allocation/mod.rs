//! Conflict checking and resource allocation
//!
//! Occupancy is read per date and resource set, then probed with a linear
//! scan. A day's bookings are few enough that no interval index is kept.

mod allocator;
mod conflict;

pub use allocator::{Allocation, AllocationRequest, SlotAllocator};
pub use conflict::{check_overlap, conflicts, Occupancy};
