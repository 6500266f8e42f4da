use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::constants::ERR_POISONED_LOCK;
use crate::error::Result;
use crate::{Allocation, DeviceAllocator, DevicePoolBuilder, RawAllocation, RawDevicePool};

/// A thread-safe device memory pool.
///
/// This type wraps a [`RawDevicePool`] in a mutex and acts as a cloneable
/// handle to the shared pool instance: clone it freely and hand the clones to
/// whichever threads need to allocate, such as a resource-loading thread and
/// a rendering thread feeding off the same device.
///
/// Every operation - allocating, growing, releasing through an
/// [`Allocation`] handle, and reading statistics - takes the same pool-wide
/// lock for its full duration, so each call observes and produces a
/// consistent pool state. All operations are synchronous and bounded; the
/// only call that can be genuinely slow is a growth step, which invokes the
/// external device allocator while holding the lock.
///
/// # Example
///
/// ```rust
/// use std::thread;
///
/// use device_pool::DevicePool;
/// use testing::FakeDeviceAllocator;
///
/// let pool = DevicePool::new(FakeDeviceAllocator::new());
///
/// // Clone the pool handle to share across threads.
/// let pool_clone = pool.clone();
///
/// let handle = thread::spawn(move || {
///     let allocation = pool_clone.allocate(256).unwrap();
///     allocation.size()
/// });
///
/// assert_eq!(handle.join().unwrap(), 256);
/// assert_eq!(pool.len(), 1);
/// ```
pub struct DevicePool<A: DeviceAllocator> {
    /// The shared pool instance protected by a mutex for thread safety.
    inner: Arc<Mutex<RawDevicePool<A>>>,
}

impl<A: DeviceAllocator> From<RawDevicePool<A>> for DevicePool<A> {
    /// Wraps an existing raw pool in thread-safe shared ownership.
    fn from(pool: RawDevicePool<A>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }
}

impl<A: DeviceAllocator> DevicePool<A> {
    /// Creates a pool over the given allocator with default configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use device_pool::DevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = DevicePool::new(FakeDeviceAllocator::new());
    ///
    /// let allocation = pool.allocate(100)?;
    /// assert_eq!(allocation.size(), 100);
    /// # Ok::<(), device_pool::Error>(())
    /// ```
    #[must_use]
    pub fn new(allocator: A) -> Self {
        Self::from(RawDevicePool::new(allocator))
    }

    /// Creates a builder for configuring and constructing a pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::num::NonZero;
    ///
    /// use device_pool::DevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = DevicePool::<FakeDeviceAllocator>::builder()
    ///     .allocator(FakeDeviceAllocator::new())
    ///     .min_block_size(NonZero::new(4096).unwrap())
    ///     .build();
    /// ```
    pub fn builder() -> DevicePoolBuilder {
        DevicePoolBuilder::new()
    }

    /// Grows the pool by one new block of at least `size` bytes, without
    /// allocating anything from it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`][crate::Error::InvalidSize] for a
    /// zero-byte request and
    /// [`Error::Allocation`][crate::Error::Allocation] when the device
    /// allocator fails. On error the pool is unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use device_pool::DevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = DevicePool::new(FakeDeviceAllocator::new());
    ///
    /// pool.add(4096)?;
    /// assert_eq!(pool.capacity(), 4096);
    /// # Ok::<(), device_pool::Error>(())
    /// ```
    pub fn add(&self, size: usize) -> Result<()> {
        let mut pool = self.inner.lock().expect(ERR_POISONED_LOCK);
        pool.add(size)
    }

    /// Allocates a region of at least `size` bytes and returns a handle that
    /// can release it.
    ///
    /// The handle shares the base memory of the block the region was carved
    /// from; the granted range within that memory is
    /// [`offset()`][Allocation::offset] to `offset() +`
    /// [`size()`][Allocation::size].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`][crate::Error::InvalidSize] for a
    /// zero-byte request and
    /// [`Error::Allocation`][crate::Error::Allocation] when a new block was
    /// needed but the device allocator could not provide one.
    ///
    /// # Example
    ///
    /// ```rust
    /// use device_pool::DevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = DevicePool::new(FakeDeviceAllocator::new());
    ///
    /// let allocation = pool.allocate(100)?;
    ///
    /// assert_eq!(allocation.offset(), 0);
    /// assert_eq!(allocation.size(), 100);
    ///
    /// allocation.release()?;
    /// assert!(pool.is_empty());
    /// # Ok::<(), device_pool::Error>(())
    /// ```
    pub fn allocate(&self, size: usize) -> Result<Allocation<A>> {
        let (raw, memory) = {
            let mut pool = self.inner.lock().expect(ERR_POISONED_LOCK);
            let raw = pool.allocate(size)?;
            let memory = pool.block_memory(&raw);
            (raw, memory)
        };

        Ok(Allocation::new(raw, memory, self.clone()))
    }

    /// Total capacity of all blocks, in bytes.
    ///
    /// This operation may block if another thread is currently accessing the
    /// pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        let pool = self.inner.lock().expect(ERR_POISONED_LOCK);
        pool.capacity()
    }

    /// Bytes not currently held by a live allocation.
    ///
    /// This operation may block if another thread is currently accessing the
    /// pool.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        let pool = self.inner.lock().expect(ERR_POISONED_LOCK);
        pool.free_bytes()
    }

    /// The number of currently live allocations.
    ///
    /// This operation may block if another thread is currently accessing the
    /// pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use device_pool::DevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = DevicePool::new(FakeDeviceAllocator::new());
    /// assert_eq!(pool.len(), 0);
    ///
    /// let _first = pool.allocate(10)?;
    /// let _second = pool.allocate(20)?;
    /// assert_eq!(pool.len(), 2);
    /// # Ok::<(), device_pool::Error>(())
    /// ```
    #[must_use]
    pub fn len(&self) -> usize {
        let pool = self.inner.lock().expect(ERR_POISONED_LOCK);
        pool.len()
    }

    /// Whether the pool has no live allocations.
    ///
    /// This operation may block if another thread is currently accessing the
    /// pool.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let pool = self.inner.lock().expect(ERR_POISONED_LOCK);
        pool.is_empty()
    }

    /// The number of blocks obtained from the device allocator so far.
    ///
    /// This operation may block if another thread is currently accessing the
    /// pool.
    #[must_use]
    pub fn block_count(&self) -> usize {
        let pool = self.inner.lock().expect(ERR_POISONED_LOCK);
        pool.block_count()
    }

    /// The currently live allocations.
    ///
    /// The list is computed against current pool state on every call, under
    /// the pool lock, so it reflects exactly the allocations that were live
    /// at that instant.
    ///
    /// # Example
    ///
    /// ```rust
    /// use device_pool::DevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = DevicePool::new(FakeDeviceAllocator::new());
    ///
    /// let kept = pool.allocate(10)?;
    /// let released = pool.allocate(20)?;
    /// released.release()?;
    ///
    /// let live = pool.allocations();
    /// assert_eq!(live.len(), 1);
    /// assert_eq!(live[0], kept);
    /// # Ok::<(), device_pool::Error>(())
    /// ```
    #[must_use]
    pub fn allocations(&self) -> Vec<Allocation<A>> {
        let pool = self.inner.lock().expect(ERR_POISONED_LOCK);

        pool.allocations()
            .map(|raw| {
                let memory = pool.block_memory(&raw);
                Allocation::new(raw, memory, self.clone())
            })
            .collect()
    }

    /// Releases a granted region back to the pool.
    ///
    /// This is an internal method used by [`Allocation::release`]; the lock
    /// it takes is the same one every other pool operation uses.
    pub(crate) fn release(&self, raw: &RawAllocation) -> Result<()> {
        let mut pool = self.inner.lock().expect(ERR_POISONED_LOCK);
        pool.release(raw)
    }

    /// Whether the region behind a handle is currently released.
    ///
    /// This is an internal method used by [`Allocation::is_released`].
    #[must_use]
    pub(crate) fn is_released(&self, raw: &RawAllocation) -> bool {
        let pool = self.inner.lock().expect(ERR_POISONED_LOCK);
        pool.is_released(raw)
    }
}

impl<A: DeviceAllocator> Clone for DevicePool<A> {
    /// Creates another handle to the same shared pool.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: DeviceAllocator> fmt::Debug for DevicePool<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("inner", &self.inner)
            .finish()
    }
}
