use std::any::type_name;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::Result;
use crate::{DeviceAllocator, DevicePool, RawAllocation};

/// A granted region of device memory held by a caller.
///
/// The handle pairs the region's location - a shared reference to the block's
/// base memory plus an offset and size within it - with a back-reference to
/// the pool that granted it, so the region can be released from wherever the
/// handle happens to live. Releasing goes through the pool's own lock; the
/// handle holds no mutable state of its own.
///
/// The offset and size of a region never change, not even when the pool hands
/// the region out again after release, so [`offset()`][Self::offset] and
/// [`size()`][Self::size] do not touch the lock.
///
/// Dropping a handle does nothing. Releasing is always an explicit, fallible
/// call - the pool keeps the region's bookkeeping either way, and a region
/// whose handle was lost simply stays live.
///
/// Two handles are equal when they name the same base memory, offset and
/// size, which makes them usable as map and set keys.
///
/// # Example
///
/// ```rust
/// use device_pool::DevicePool;
/// use testing::FakeDeviceAllocator;
///
/// let pool = DevicePool::new(FakeDeviceAllocator::new());
///
/// let allocation = pool.allocate(128)?;
/// assert_eq!(allocation.size(), 128);
/// assert!(!allocation.is_released());
///
/// allocation.release()?;
/// assert!(allocation.is_released());
///
/// // A second release is an error, not a no-op.
/// assert!(allocation.release().is_err());
/// # Ok::<(), device_pool::Error>(())
/// ```
pub struct Allocation<A: DeviceAllocator> {
    /// The region's location and extent within the pool.
    raw: RawAllocation,

    /// The base memory of the owning block, shared with the block itself and
    /// with every other handle carved from it.
    memory: Arc<A::Memory>,

    /// A handle to the pool that granted this region; release and state
    /// queries go through it.
    pool: DevicePool<A>,
}

impl<A: DeviceAllocator> Allocation<A> {
    /// Creates a new allocation handle.
    ///
    /// This method is intended for internal use by [`DevicePool`].
    pub(crate) fn new(raw: RawAllocation, memory: Arc<A::Memory>, pool: DevicePool<A>) -> Self {
        Self { raw, memory, pool }
    }

    /// The byte offset of this region within its block's memory.
    #[must_use]
    #[inline]
    pub fn offset(&self) -> usize {
        self.raw.offset()
    }

    /// The size of this region in bytes.
    ///
    /// This is the granted size. It equals the requested size for a fresh
    /// allocation, but a region produced by reuse keeps the original (and
    /// possibly larger) extent of the released region it reactivated.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        self.raw.size()
    }

    /// The base memory of the block this region was carved from.
    ///
    /// The granted range within it is [`offset()`][Self::offset] to
    /// `offset() + size()`.
    #[must_use]
    #[inline]
    pub fn memory(&self) -> &A::Memory {
        &self.memory
    }

    /// This allocation as a plain value handle, usable with the underlying
    /// [`RawDevicePool`][crate::RawDevicePool] API.
    #[must_use]
    #[inline]
    pub fn as_raw(&self) -> RawAllocation {
        self.raw
    }

    /// Whether this region has been released and not handed out again.
    ///
    /// This consults the pool under its lock - the released flag is pool
    /// state, not handle state.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.pool.is_released(&self.raw)
    }

    /// Releases this region back to the pool.
    ///
    /// The pool keeps the region for reuse; nothing is handed back to the
    /// device allocator. Takes the pool's lock, like every other pool
    /// operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyReleased`][crate::Error::AlreadyReleased] if
    /// the region was already released and has not been handed out again
    /// since.
    pub fn release(&self) -> Result<()> {
        self.pool.release(&self.raw)
    }
}

impl<A: DeviceAllocator> Clone for Allocation<A> {
    /// Creates another handle to the same granted region.
    ///
    /// Cloning does not duplicate the grant - all clones name the one
    /// region, and releasing through any of them releases it for all.
    fn clone(&self) -> Self {
        Self {
            raw: self.raw,
            memory: Arc::clone(&self.memory),
            pool: self.pool.clone(),
        }
    }
}

impl<A: DeviceAllocator> PartialEq for Allocation<A> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.memory, &other.memory)
            && self.raw.offset() == other.raw.offset()
            && self.raw.size() == other.raw.size()
    }
}

impl<A: DeviceAllocator> Eq for Allocation<A> {}

impl<A: DeviceAllocator> Hash for Allocation<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.memory).hash(state);
        self.raw.offset().hash(state);
        self.raw.size().hash(state);
    }
}

impl<A: DeviceAllocator> fmt::Debug for Allocation<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("offset", &self.raw.offset())
            .field("size", &self.raw.size())
            .finish_non_exhaustive()
    }
}
