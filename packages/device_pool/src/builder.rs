use std::num::NonZero;

use new_zealand::nz;

use crate::{DeviceAllocator, DevicePool, RawDevicePool};

/// Builder for creating an instance of [`DevicePool`] or [`RawDevicePool`].
///
/// A pool requires its device allocator to be specified at construction
/// time; the allocator is mandatory, whereas other settings are optional.
/// This is enforced at compile time - `build()` only exists once
/// [`allocator()`][Self::allocator] has been called.
///
/// # Examples
///
/// ```rust
/// use std::num::NonZero;
///
/// use device_pool::DevicePool;
/// use testing::FakeDeviceAllocator;
///
/// // Default configuration.
/// let pool = DevicePool::<FakeDeviceAllocator>::builder()
///     .allocator(FakeDeviceAllocator::new())
///     .build();
///
/// // Growing in blocks of at least 64 KiB.
/// let pool = DevicePool::<FakeDeviceAllocator>::builder()
///     .allocator(FakeDeviceAllocator::new())
///     .min_block_size(NonZero::new(64 * 1024).unwrap())
///     .build();
/// ```
#[derive(Debug)]
#[must_use]
pub struct DevicePoolBuilder<A = ()> {
    allocator: A,
    min_block_size: NonZero<usize>,
}

impl DevicePoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            allocator: (),
            min_block_size: nz!(1),
        }
    }
}

impl<A> DevicePoolBuilder<A> {
    /// Sets the device allocator the pool obtains its blocks from.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use device_pool::DevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = DevicePool::<FakeDeviceAllocator>::builder()
    ///     .allocator(FakeDeviceAllocator::new())
    ///     .build();
    /// ```
    pub fn allocator<B: DeviceAllocator>(self, allocator: B) -> DevicePoolBuilder<B> {
        DevicePoolBuilder {
            allocator,
            min_block_size: self.min_block_size,
        }
    }

    /// Sets the smallest block size the pool will request from its
    /// allocator.
    ///
    /// Requests that need a new block are raised to at least this size, so a
    /// burst of small allocations shares one block instead of producing one
    /// block each. The default is one byte, which leaves every block request
    /// at exactly the size that triggered it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::num::NonZero;
    ///
    /// use device_pool::RawDevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let allocator = FakeDeviceAllocator::new();
    /// let mut pool = RawDevicePool::<FakeDeviceAllocator>::builder()
    ///     .allocator(allocator)
    ///     .min_block_size(NonZero::new(4096).unwrap())
    ///     .build_raw();
    ///
    /// // A tiny allocation still produces a full-sized block.
    /// let _small = pool.allocate(16)?;
    /// assert_eq!(pool.capacity(), 4096);
    /// # Ok::<(), device_pool::Error>(())
    /// ```
    pub fn min_block_size(mut self, size: NonZero<usize>) -> Self {
        self.min_block_size = size;
        self
    }
}

impl<A: DeviceAllocator> DevicePoolBuilder<A> {
    /// Builds a thread-safe [`DevicePool`] with the specified configuration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use device_pool::DevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = DevicePool::<FakeDeviceAllocator>::builder()
    ///     .allocator(FakeDeviceAllocator::new())
    ///     .build();
    /// ```
    #[must_use]
    pub fn build(self) -> DevicePool<A> {
        DevicePool::from(self.build_raw())
    }

    /// Builds a [`RawDevicePool`] for callers that manage synchronization
    /// themselves.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use device_pool::RawDevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = RawDevicePool::<FakeDeviceAllocator>::builder()
    ///     .allocator(FakeDeviceAllocator::new())
    ///     .build_raw();
    /// ```
    #[must_use]
    pub fn build_raw(self) -> RawDevicePool<A> {
        RawDevicePool::new_inner(self.allocator, self.min_block_size)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;
    use crate::test_fakes::FakeDeviceAllocator;

    use super::*;

    assert_impl_all!(DevicePoolBuilder: Send, Debug);

    #[test]
    fn defaults_leave_block_requests_untouched() {
        let mut pool = DevicePoolBuilder::new()
            .allocator(FakeDeviceAllocator::new())
            .build_raw();

        _ = pool.allocate(7).unwrap();
        assert_eq!(pool.capacity(), 7);
    }

    #[test]
    fn min_block_size_can_be_set_before_or_after_allocator() {
        let before = DevicePoolBuilder::new()
            .min_block_size(nz!(512))
            .allocator(FakeDeviceAllocator::new())
            .build_raw();
        drop(before);

        let mut after = DevicePoolBuilder::new()
            .allocator(FakeDeviceAllocator::new())
            .min_block_size(nz!(512))
            .build_raw();

        _ = after.allocate(1).unwrap();
        assert_eq!(after.capacity(), 512);
    }

    #[test]
    fn min_block_size_can_be_overridden() {
        let mut pool = DevicePoolBuilder::new()
            .allocator(FakeDeviceAllocator::new())
            .min_block_size(nz!(512))
            .min_block_size(nz!(64))
            .build_raw();

        _ = pool.allocate(1).unwrap();
        assert_eq!(pool.capacity(), 64);
    }
}
