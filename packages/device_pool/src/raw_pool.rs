use std::any::type_name;
use std::fmt;
use std::num::NonZero;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::block::PoolBlock;
use crate::error::{Error, Result};
use crate::region::{Region, RegionCoordinates};
use crate::{AllocationError, DeviceAllocator, DeviceMemory, DevicePoolBuilder, RawAllocation};

/// Global counter for generating unique pool IDs.
static POOL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique pool ID.
fn generate_pool_id() -> u64 {
    POOL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A sub-allocator that carves caller-sized regions out of large device
/// memory blocks, with manual synchronization.
///
/// The pool obtains blocks from the [`DeviceAllocator`] it was built with -
/// an expensive call it makes as rarely as possible - and satisfies requests
/// in three tiers, in strict order:
///
/// 1. Reuse: the first previously released region of sufficient size, across
///    blocks in registration order. The region keeps its original offset and
///    size, so the grant may be larger than the request.
/// 2. Bump: a fresh region carved from the first registered block with enough
///    untouched space.
/// 3. Growth: a brand-new block from the device allocator, sized to the
///    request (or the pool's minimum block size, whichever is larger).
///
/// Blocks are never returned to the allocator and bump offsets never move
/// backwards. Released-but-never-reused space inside a block is fragmentation
/// the pool accepts; it does not compact.
///
/// This is the single-threaded core: all mutating operations take `&mut
/// self`, and handles are plain [`RawAllocation`] values. For a thread-safe
/// pool with self-releasing handles, wrap it in
/// [`DevicePool`][crate::DevicePool].
///
/// # Example
///
/// ```rust
/// use device_pool::RawDevicePool;
/// use testing::FakeDeviceAllocator;
///
/// let mut pool = RawDevicePool::new(FakeDeviceAllocator::new());
///
/// let allocation = pool.allocate(100)?;
/// assert_eq!(allocation.size(), 100);
/// assert_eq!(pool.len(), 1);
///
/// pool.release(&allocation)?;
/// assert_eq!(pool.len(), 0);
/// assert_eq!(pool.free_bytes(), pool.capacity());
/// # Ok::<(), device_pool::Error>(())
/// ```
pub struct RawDevicePool<A: DeviceAllocator> {
    /// We need to uniquely identify each pool to ensure that handles are not
    /// returned to the wrong pool. If the pool ID does not match when a
    /// handle is returned, we panic.
    pool_id: u64,

    /// The external capability new blocks are obtained from.
    allocator: A,

    /// Lower bound on the size of any block requested from the allocator.
    min_block_size: NonZero<usize>,

    /// Every block ever obtained, in registration order. Blocks live for the
    /// lifetime of the pool.
    blocks: Vec<PoolBlock<A::Memory>>,

    /// Sum of all block capacities.
    capacity: usize,

    /// Bytes not currently held by a live allocation, across all blocks. This
    /// counts both untouched bump space and released regions.
    free_bytes: usize,

    /// Number of currently live allocations. Tracked explicitly to avoid
    /// summing across blocks on every query.
    live: usize,
}

impl<A: DeviceAllocator> RawDevicePool<A> {
    /// Creates a pool over the given allocator with default configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use device_pool::RawDevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = RawDevicePool::new(FakeDeviceAllocator::new());
    ///
    /// assert_eq!(pool.capacity(), 0);
    /// assert!(pool.is_empty());
    /// ```
    #[must_use]
    pub fn new(allocator: A) -> Self {
        Self::builder().allocator(allocator).build_raw()
    }

    /// Creates a builder for configuring and constructing a pool.
    ///
    /// The allocator is mandatory; other settings are optional. The builder
    /// produces either a [`RawDevicePool`] or a thread-safe
    /// [`DevicePool`][crate::DevicePool].
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::num::NonZero;
    ///
    /// use device_pool::RawDevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let pool = RawDevicePool::<FakeDeviceAllocator>::builder()
    ///     .allocator(FakeDeviceAllocator::new())
    ///     .min_block_size(NonZero::new(4096).unwrap())
    ///     .build_raw();
    /// ```
    #[inline]
    pub fn builder() -> DevicePoolBuilder {
        DevicePoolBuilder::new()
    }

    #[must_use]
    pub(crate) fn new_inner(allocator: A, min_block_size: NonZero<usize>) -> Self {
        Self {
            pool_id: generate_pool_id(),
            allocator,
            min_block_size,
            blocks: Vec::new(),
            capacity: 0,
            free_bytes: 0,
            live: 0,
        }
    }

    /// Grows the pool by one new block of at least `size` bytes, without
    /// allocating anything from it.
    ///
    /// Use this to pre-provision capacity before a burst of requests, so the
    /// expensive allocator call happens at a time of your choosing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] for a zero-byte request and
    /// [`Error::Allocation`] when the allocator fails or grants fewer bytes
    /// than asked for. On error the pool is unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use device_pool::RawDevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let mut pool = RawDevicePool::new(FakeDeviceAllocator::new());
    ///
    /// pool.add(1024)?;
    /// assert_eq!(pool.capacity(), 1024);
    /// assert_eq!(pool.free_bytes(), 1024);
    /// # Ok::<(), device_pool::Error>(())
    /// ```
    pub fn add(&mut self, size: usize) -> Result<()> {
        if size < 1 {
            return Err(Error::InvalidSize { size });
        }

        _ = self.register_new_block(size)?;
        Ok(())
    }

    /// Allocates a region of at least `size` bytes.
    ///
    /// The returned handle carries the granted offset and size. The grant
    /// equals the request unless a released region was reused, in which case
    /// it is that region's original (possibly larger) size - the pool's free
    /// bytes drop by the granted amount either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] for a zero-byte request and
    /// [`Error::Allocation`] when a new block was needed but the allocator
    /// could not provide one. A failed attempt leaves all statistics
    /// untouched.
    ///
    /// # Example
    ///
    /// ```rust
    /// use device_pool::RawDevicePool;
    /// use testing::FakeDeviceAllocator;
    ///
    /// let mut pool = RawDevicePool::new(FakeDeviceAllocator::new());
    ///
    /// let first = pool.allocate(60)?;
    /// pool.release(&first)?;
    ///
    /// // The released 60-byte region is reused for a smaller request and
    /// // keeps its original extent.
    /// let second = pool.allocate(40)?;
    /// assert_eq!(second.offset(), first.offset());
    /// assert_eq!(second.size(), 60);
    /// # Ok::<(), device_pool::Error>(())
    /// ```
    pub fn allocate(&mut self, size: usize) -> Result<RawAllocation> {
        if size < 1 {
            return Err(Error::InvalidSize { size });
        }

        // With less aggregate free space than the request there is provably
        // nothing to reuse or bump from; go straight to a new block.
        if size <= self.free_bytes {
            if let Some(allocation) = self.reuse_released(size) {
                return Ok(allocation);
            }

            if let Some(allocation) = self.bump_from_existing(size) {
                return Ok(allocation);
            }
        }

        self.allocate_from_new_block(size)
    }

    /// Releases a granted region back to the pool.
    ///
    /// Nothing is handed back to the device allocator; the region is marked
    /// released and becomes a candidate for reuse by later requests. The
    /// handle stays valid as a key but refers to a released region until the
    /// pool reactivates it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyReleased`] if this region was already released
    /// and has not been handed out again since.
    ///
    /// # Panics
    ///
    /// Panics if the handle comes from a different pool.
    pub fn release(&mut self, allocation: &RawAllocation) -> Result<()> {
        let region = self
            .region_mut_for(allocation)
            .expect("the allocation did not point to an existing region in the pool");

        if region.is_released() {
            return Err(Error::AlreadyReleased);
        }

        let size = region.size();
        region.mark_released();

        self.free_bytes = self
            .free_bytes
            .checked_add(size)
            .expect("free bytes cannot exceed usize");

        assert!(
            self.free_bytes <= self.capacity,
            "released more bytes than the pool owns - pool bookkeeping is corrupt",
        );

        self.live = self
            .live
            .checked_sub(1)
            .expect("released a live allocation, so the live count is at least 1");

        trace!(size, offset = allocation.offset(), "released region");
        Ok(())
    }

    /// Whether the region behind a handle is currently released.
    ///
    /// # Panics
    ///
    /// Panics if the handle comes from a different pool.
    #[must_use]
    pub fn is_released(&self, allocation: &RawAllocation) -> bool {
        self.assert_owns(allocation);

        self.blocks
            .get(allocation.coordinates().block_index())
            .and_then(|block| block.region(allocation.coordinates().index_in_block()))
            .expect("the allocation did not point to an existing region in the pool")
            .is_released()
    }

    /// The shared base memory of the block a region was carved from.
    ///
    /// The granted region spans `allocation.offset()` to `allocation.offset()
    /// + allocation.size()` within this memory.
    ///
    /// # Panics
    ///
    /// Panics if the handle comes from a different pool.
    #[must_use]
    pub fn block_memory(&self, allocation: &RawAllocation) -> Arc<A::Memory> {
        self.assert_owns(allocation);

        let block = self
            .blocks
            .get(allocation.coordinates().block_index())
            .expect("the allocation did not point to an existing region in the pool");

        Arc::clone(block.memory())
    }

    /// Total capacity of all blocks, in bytes.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes not currently held by a live allocation.
    ///
    /// Counts both space no allocation has ever touched and released regions
    /// awaiting reuse. It is not one contiguous run - a request smaller than
    /// this can still require a new block.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Mutating the self-check makes it meaningless, not wrong.
    pub fn free_bytes(&self) -> usize {
        #[cfg(debug_assertions)]
        {
            let live_bytes = self
                .blocks
                .iter()
                .map(PoolBlock::live_bytes)
                .fold(0_usize, |total, bytes| {
                    total
                        .checked_add(bytes)
                        .expect("live bytes cannot exceed usize")
                });

            debug_assert_eq!(
                self.free_bytes,
                self.capacity
                    .checked_sub(live_bytes)
                    .expect("live bytes cannot exceed pool capacity"),
            );
        }

        self.free_bytes
    }

    /// The number of currently live allocations.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Mutating the self-check makes it meaningless, not wrong.
    pub fn len(&self) -> usize {
        debug_assert_eq!(
            self.live,
            self.blocks
                .iter()
                .map(|block| block.live_regions().count())
                .sum::<usize>()
        );

        self.live
    }

    /// Whether the pool has no live allocations.
    ///
    /// An empty pool may still hold any amount of block capacity.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The number of blocks obtained from the allocator so far.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The currently live allocations, as value handles.
    ///
    /// The iterator is computed lazily against current pool state on every
    /// call; it is not a snapshot taken at some earlier time. Blocks are
    /// visited in registration order, regions in issue order.
    pub fn allocations(&self) -> impl Iterator<Item = RawAllocation> + '_ {
        let pool_id = self.pool_id;

        self.blocks
            .iter()
            .enumerate()
            .flat_map(move |(block_index, block)| {
                block.live_regions().map(move |(region_index, region)| {
                    RawAllocation::new(
                        pool_id,
                        RegionCoordinates::from_parts(block_index, region_index),
                        region.offset(),
                        region.size(),
                    )
                })
            })
    }

    /// Tier 1: reactivate the first released region large enough for the
    /// request, if any.
    fn reuse_released(&mut self, size: usize) -> Option<RawAllocation> {
        let (block_index, region_index) = self
            .blocks
            .iter()
            .enumerate()
            .find_map(|(block_index, block)| {
                block
                    .first_released(size)
                    .map(|region_index| (block_index, region_index))
            })?;

        let region = self
            .blocks
            .get_mut(block_index)
            .and_then(|block| block.region_mut(region_index))
            .expect("scan just located this region");

        region.mark_live();
        let granted = region.size();
        let offset = region.offset();

        // The grant is the region's original size, not the requested one.
        self.free_bytes = self
            .free_bytes
            .checked_sub(granted)
            .expect("released regions are counted in free bytes");

        self.live = self
            .live
            .checked_add(1)
            .expect("live allocation count cannot exceed usize");

        trace!(requested = size, granted, offset, "reused released region");

        Some(RawAllocation::new(
            self.pool_id,
            RegionCoordinates::from_parts(block_index, region_index),
            offset,
            granted,
        ))
    }

    /// Tier 2: bump-allocate from the first block with enough untouched
    /// space, if any.
    fn bump_from_existing(&mut self, size: usize) -> Option<RawAllocation> {
        let block_index = self.blocks.iter().position(|block| block.has_capacity(size))?;

        Some(self.bump_from(block_index, size))
    }

    /// Tier 3: obtain a new block from the allocator and bump-allocate the
    /// request from it.
    fn allocate_from_new_block(&mut self, size: usize) -> Result<RawAllocation> {
        let block_index = self.register_new_block(size)?;

        // The new block holds at least `size` bytes, so this cannot panic.
        Ok(self.bump_from(block_index, size))
    }

    /// Carves `size` bytes from the given block and accounts for the grant.
    /// The block must have capacity for it.
    fn bump_from(&mut self, block_index: usize, size: usize) -> RawAllocation {
        let block = self
            .blocks
            .get_mut(block_index)
            .expect("caller located this block in this pool");

        let region_index = block.bump_allocate(size);
        let offset = block
            .region(region_index)
            .expect("region was just created")
            .offset();

        self.free_bytes = self
            .free_bytes
            .checked_sub(size)
            .expect("a bump allocation never exceeds the free bytes that contain it");

        self.live = self
            .live
            .checked_add(1)
            .expect("live allocation count cannot exceed usize");

        trace!(size, offset, block_index, "bump-allocated region");

        RawAllocation::new(
            self.pool_id,
            RegionCoordinates::from_parts(block_index, region_index),
            offset,
            size,
        )
    }

    /// Obtains a block of at least `min` bytes from the allocator and
    /// registers it. Returns the new block's index.
    ///
    /// Statistics are updated only after the allocator has succeeded and the
    /// granted block has been validated, so a failure changes nothing.
    fn register_new_block(&mut self, min: usize) -> Result<usize> {
        let requested = min.max(self.min_block_size.get());

        let memory = self.allocator.allocate(requested)?;

        if memory.size() < requested {
            return Err(AllocationError::undersized(requested, memory.size()).into());
        }

        let block = PoolBlock::new(memory);
        let block_capacity = block.capacity();

        self.capacity = self
            .capacity
            .checked_add(block_capacity)
            .expect("pool capacity cannot exceed usize");

        self.free_bytes = self
            .free_bytes
            .checked_add(block_capacity)
            .expect("free bytes cannot exceed usize");

        self.blocks.push(block);

        debug!(
            bytes = block_capacity,
            blocks = self.blocks.len(),
            "registered new device block"
        );

        // Cannot wrap: we just pushed a block, so len() is at least 1.
        Ok(self.blocks.len().wrapping_sub(1))
    }

    fn region_mut_for(&mut self, allocation: &RawAllocation) -> Option<&mut Region> {
        self.assert_owns(allocation);

        self.blocks
            .get_mut(allocation.coordinates().block_index())
            .and_then(|block| block.region_mut(allocation.coordinates().index_in_block()))
    }

    fn assert_owns(&self, allocation: &RawAllocation) {
        assert!(
            allocation.pool_id() == self.pool_id,
            "attempted to use an allocation from a different pool \
             (allocation pool ID: {}, current pool ID: {})",
            allocation.pool_id(),
            self.pool_id,
        );
    }
}

impl<A: DeviceAllocator> fmt::Debug for RawDevicePool<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("capacity", &self.capacity)
            .field("free_bytes", &self.free_bytes)
            .field("live", &self.live)
            .field("blocks", &self.blocks.len())
            .finish_non_exhaustive()
    }
}
