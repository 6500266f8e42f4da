use std::num::NonZero;

use crate::{AllocationError, DeviceAllocator};

/// A decorator that pads every block request to device page granularity
/// before delegating to the wrapped allocator.
///
/// A request of `size` bytes against a page size of `P` is forwarded as
/// `(size / P + 1) * P`: the next page boundary strictly above `size`. A
/// request that is already page-aligned therefore still gains one full page -
/// asking for exactly one page allocates two.
///
/// The decorator holds no mutable state, so one instance can serve any number
/// of pools.
///
/// # Example
///
/// ```rust
/// use std::num::NonZero;
///
/// use device_pool::{DeviceAllocator, DeviceMemory, PagedAllocator};
/// use testing::FakeDeviceAllocator;
///
/// let inner = FakeDeviceAllocator::new();
/// let paged = PagedAllocator::new(inner, NonZero::new(64).unwrap());
///
/// let memory = paged.allocate(100)?;
/// assert_eq!(memory.size(), 128);
///
/// // Page-aligned requests round up too.
/// let memory = paged.allocate(64)?;
/// assert_eq!(memory.size(), 128);
/// # Ok::<(), device_pool::AllocationError>(())
/// ```
#[derive(Clone, Debug)]
pub struct PagedAllocator<A> {
    inner: A,
    page_size: NonZero<usize>,
}

impl<A> PagedAllocator<A> {
    /// Wraps an allocator so that all requests are padded to multiples of
    /// `page_size` bytes.
    #[must_use]
    pub fn new(inner: A, page_size: NonZero<usize>) -> Self {
        Self { inner, page_size }
    }

    /// The page granularity requests are padded to.
    #[must_use]
    #[inline]
    pub fn page_size(&self) -> NonZero<usize> {
        self.page_size
    }
}

impl<A: DeviceAllocator> DeviceAllocator for PagedAllocator<A> {
    type Memory = A::Memory;

    fn allocate(&self, size: usize) -> Result<Self::Memory, AllocationError> {
        let page = self.page_size.get();

        #[expect(
            clippy::integer_division,
            reason = "page-count arithmetic; the remainder is what the padding replaces"
        )]
        let padded = (size / page)
            .checked_add(1)
            .and_then(|pages| pages.checked_mul(page))
            .ok_or_else(|| {
                AllocationError::new(size, "padded request exceeds addressable memory")
            })?;

        self.inner.allocate(padded)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use new_zealand::nz;
    use static_assertions::assert_impl_all;
    use crate::test_fakes::FakeDeviceAllocator;

    use super::*;

    assert_impl_all!(PagedAllocator<FakeDeviceAllocator>: Send, Sync, Debug);

    #[test]
    fn requests_are_padded_to_the_next_boundary() {
        let allocator = PagedAllocator::new(FakeDeviceAllocator::new(), nz!(64));

        _ = allocator.allocate(1).unwrap();
        _ = allocator.allocate(63).unwrap();
        _ = allocator.allocate(100).unwrap();

        assert_eq!(allocator.inner.requests(), vec![64, 64, 128]);
    }

    #[test]
    fn aligned_requests_still_gain_a_page() {
        let allocator = PagedAllocator::new(FakeDeviceAllocator::new(), nz!(64));

        _ = allocator.allocate(64).unwrap();
        _ = allocator.allocate(128).unwrap();

        assert_eq!(allocator.inner.requests(), vec![128, 192]);
    }

    #[test]
    fn zero_byte_request_is_one_page() {
        let allocator = PagedAllocator::new(FakeDeviceAllocator::new(), nz!(64));

        _ = allocator.allocate(0).unwrap();
        assert_eq!(allocator.inner.requests(), vec![64]);
    }

    #[test]
    fn inner_failure_passes_through() {
        let allocator = PagedAllocator::new(FakeDeviceAllocator::failing_after(0), nz!(64));

        assert!(allocator.allocate(10).is_err());
    }

    #[test]
    fn oversized_request_fails_instead_of_wrapping() {
        let allocator = PagedAllocator::new(FakeDeviceAllocator::new(), nz!(64));

        assert!(allocator.allocate(usize::MAX).is_err());
        assert!(allocator.inner.requests().is_empty());
    }
}
