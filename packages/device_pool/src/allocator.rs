use std::fmt::Debug;
use std::sync::Arc;

use crate::AllocationError;

/// One raw block of device memory obtained from a [`DeviceAllocator`].
///
/// The pool never inspects a block beyond its size. The block value itself is
/// the identity that regions carved from it share - two allocations belong to
/// the same block exactly when they share the same memory instance.
///
/// Implementations typically wrap a driver handle (a mapped buffer, a device
/// pointer and its length, a file-backed mapping and so on). Whatever the
/// representation, the reported size must not change for the lifetime of the
/// value, as the pool caches it at registration time.
pub trait DeviceMemory: Debug {
    /// The usable size of this block in bytes.
    fn size(&self) -> usize;
}

/// The expensive external allocation capability a pool is constructed with.
///
/// Each call is expected to be costly (a driver or hardware allocation), which
/// is the whole reason the pool exists: it calls this as rarely as possible
/// and sub-divides the blocks it gets.
///
/// # Contract
///
/// A successful result must carry at least `size` usable bytes. The pool
/// verifies this and treats an undersized block the same as an error, so an
/// implementation gains nothing from rounding down. Granting *more* than
/// `size` is fine and common (page-granular allocators do this); the surplus
/// becomes usable pool capacity.
///
/// # Example
///
/// ```rust
/// use device_pool::{AllocationError, DeviceAllocator, DeviceMemory};
///
/// /// Pretend device memory backed by a host buffer.
/// #[derive(Debug)]
/// struct HostMemory(Vec<u8>);
///
/// impl DeviceMemory for HostMemory {
///     fn size(&self) -> usize {
///         self.0.len()
///     }
/// }
///
/// #[derive(Debug)]
/// struct HostAllocator;
///
/// impl DeviceAllocator for HostAllocator {
///     type Memory = HostMemory;
///
///     fn allocate(&self, size: usize) -> Result<HostMemory, AllocationError> {
///         Ok(HostMemory(vec![0; size]))
///     }
/// }
///
/// let memory = HostAllocator.allocate(128).unwrap();
/// assert_eq!(memory.size(), 128);
/// ```
pub trait DeviceAllocator {
    /// The type of raw memory block this allocator produces.
    type Memory: DeviceMemory;

    /// Obtains one new block of at least `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError`] when the request cannot be satisfied. There
    /// is no "absent" success value - an allocator either produces a usable
    /// block or reports why it could not.
    fn allocate(&self, size: usize) -> Result<Self::Memory, AllocationError>;
}

/// Allocators behind an [`Arc`] are allocators, so one underlying capability
/// can be shared by several pools.
impl<A> DeviceAllocator for Arc<A>
where
    A: DeviceAllocator + ?Sized,
{
    type Memory = A::Memory;

    fn allocate(&self, size: usize) -> Result<Self::Memory, AllocationError> {
        (**self).allocate(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CountedMemory(usize);

    impl DeviceMemory for CountedMemory {
        fn size(&self) -> usize {
            self.0
        }
    }

    #[derive(Debug)]
    struct CountingAllocator;

    impl DeviceAllocator for CountingAllocator {
        type Memory = CountedMemory;

        fn allocate(&self, size: usize) -> Result<Self::Memory, AllocationError> {
            Ok(CountedMemory(size))
        }
    }

    #[test]
    fn shared_allocator_delegates() {
        let allocator = Arc::new(CountingAllocator);

        let memory = allocator.allocate(64).unwrap();
        assert_eq!(memory.size(), 64);
    }
}
