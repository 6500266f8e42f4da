//! This package provides [`DevicePool`], a block-based sub-allocator that
//! carves caller-sized regions out of large blocks of device memory.
//!
//! Device memory is obtained through an expensive external call - a driver or
//! hardware allocation - modeled here by the [`DeviceAllocator`] capability a
//! pool is constructed with. The pool makes that call as rarely as it can:
//! released regions are handed out again before existing blocks are carved
//! further, and existing blocks are carved further before a new block is
//! requested. Blocks, once obtained, are kept for the lifetime of the pool.
//!
//! # Allocation strategy
//!
//! Each request is satisfied by the first of three tiers that can serve it:
//!
//! 1. **Reuse**: the first previously released region of sufficient size, in
//!    block registration order and region issue order. The region keeps its
//!    original offset and size, so the grant may exceed the request.
//! 2. **Bump**: a fresh region carved off the untouched space of the first
//!    block that has enough of it.
//! 3. **Growth**: a new block from the device allocator, sized to the request
//!    or the configured minimum block size, whichever is larger.
//!
//! The reuse tier takes the first sufficient region rather than the best
//! fitting one, and bump space that a released region once occupied is never
//! compacted. Both are deliberate costs of keeping grants stable and
//! allocator calls rare; a pool under heavy size-varied churn will carry some
//! fragmentation.
//!
//! # Example
//!
//! ```rust
//! use device_pool::DevicePool;
//! use testing::FakeDeviceAllocator;
//!
//! // In production the allocator talks to a device driver; tests and
//! // examples use a fake one backed by nothing at all.
//! let pool = DevicePool::new(FakeDeviceAllocator::new());
//!
//! // Pre-provision one big block.
//! pool.add(1024)?;
//!
//! let first = pool.allocate(100)?;
//! let second = pool.allocate(200)?;
//! assert_eq!(first.offset(), 0);
//! assert_eq!(second.offset(), 100);
//!
//! // Releasing keeps the block; the region becomes reusable.
//! first.release()?;
//! let reused = pool.allocate(50)?;
//! assert_eq!(reused.offset(), 0);
//! assert_eq!(reused.size(), 100); // original extent, not 50
//! # Ok::<(), device_pool::Error>(())
//! ```
//!
//! For single-threaded use without the pool-wide mutex, use
//! [`RawDevicePool`] and its [`RawAllocation`] value handles:
//!
//! ```rust
//! use device_pool::RawDevicePool;
//! use testing::FakeDeviceAllocator;
//!
//! let mut pool = RawDevicePool::new(FakeDeviceAllocator::new());
//!
//! let allocation = pool.allocate(100)?;
//! pool.release(&allocation)?;
//! # Ok::<(), device_pool::Error>(())
//! ```
//!
//! Allocators compose: [`PagedAllocator`] pads every block request to page
//! granularity before it reaches the device, and an allocator behind an
//! `Arc` can feed several pools.
//!
//! To connect a real device, implement [`DeviceAllocator`] and
//! [`DeviceMemory`] for its allocation entry point and buffer type; see the
//! trait documentation for a complete implementation sketch.

mod allocation;
mod allocator;
mod block;
mod builder;
mod constants;
mod error;
mod paged;
mod pool;
mod raw_pool;
mod region;

#[cfg(test)]
mod test_fakes;

pub use allocation::*;
pub use allocator::*;
pub use builder::*;
pub use error::{AllocationError, Error};
pub use paged::*;
pub use pool::*;
pub use raw_pool::*;
pub use region::RawAllocation;
