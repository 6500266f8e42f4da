use std::sync::Arc;

use crate::DeviceMemory;
use crate::region::Region;

/// One block of device memory owned by a pool, carved up by bump allocation.
///
/// The block hands out sequential, non-overlapping regions from the front of
/// its memory and keeps every region it ever issued, live or released, in
/// issue order. Released regions are found again by a linear scan; the bump
/// offset itself never moves backwards, so space that was bumped past is only
/// ever reclaimed through whole-region reuse.
///
/// The memory is held behind an [`Arc`] so that handles can share the base
/// reference with the block that owns it.
#[derive(Debug)]
pub(crate) struct PoolBlock<M> {
    memory: Arc<M>,

    /// Usable size of `memory` in bytes. Cached at construction; the memory's
    /// reported size must not change afterwards.
    capacity: usize,

    /// Where the next bump allocation starts. Monotonically non-decreasing.
    next_free_offset: usize,

    /// Every region ever issued by this block, in issue order.
    regions: Vec<Region>,
}

impl<M: DeviceMemory> PoolBlock<M> {
    #[must_use]
    pub(crate) fn new(memory: M) -> Self {
        let capacity = memory.size();

        Self {
            memory: Arc::new(memory),
            capacity,
            next_free_offset: 0,
            regions: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub(crate) fn memory(&self) -> &Arc<M> {
        &self.memory
    }

    /// Whether a bump allocation of `size` bytes would fit in the remaining
    /// untouched space. Pure query, no side effects.
    #[must_use]
    pub(crate) fn has_capacity(&self, size: usize) -> bool {
        self.next_free_offset
            .checked_add(size)
            .is_some_and(|end| end <= self.capacity)
    }

    /// Carves a new region of `size` bytes off the front of the free space
    /// and returns its index in the region list.
    ///
    /// # Panics
    ///
    /// Panics if the region does not fit. The caller must check
    /// [`has_capacity`][Self::has_capacity] first; arriving here without
    /// capacity is a bug in the pool, not a recoverable condition.
    pub(crate) fn bump_allocate(&mut self, size: usize) -> usize {
        assert!(
            self.has_capacity(size),
            "bump allocation of {size} bytes exceeds block capacity \
             (offset {offset} of {capacity})",
            offset = self.next_free_offset,
            capacity = self.capacity,
        );

        let offset = self.next_free_offset;
        self.regions.push(Region::new(offset, size));

        // Cannot overflow: has_capacity() proved offset + size <= capacity.
        self.next_free_offset = offset.wrapping_add(size);

        // Index of the region we just pushed.
        self.regions.len().wrapping_sub(1)
    }

    /// Finds the first released region, in issue order, of at least
    /// `min_size` bytes.
    ///
    /// This is a linear scan. Released regions are typically few relative to
    /// total allocation churn, so no secondary index is kept.
    #[must_use]
    pub(crate) fn first_released(&self, min_size: usize) -> Option<usize> {
        self.regions
            .iter()
            .position(|region| region.is_released() && region.size() >= min_size)
    }

    #[must_use]
    pub(crate) fn region(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    #[must_use]
    pub(crate) fn region_mut(&mut self, index: usize) -> Option<&mut Region> {
        self.regions.get_mut(index)
    }

    /// The regions currently held by callers, with their indexes, in issue
    /// order.
    pub(crate) fn live_regions(&self) -> impl Iterator<Item = (usize, &Region)> {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, region)| !region.is_released())
    }

    /// Sum of the sizes of all live regions. Used by the pool's debug
    /// self-checks.
    #[cfg(debug_assertions)]
    #[must_use]
    pub(crate) fn live_bytes(&self) -> usize {
        self.live_regions()
            .map(|(_, region)| region.size())
            .fold(0_usize, |total, size| {
                total
                    .checked_add(size)
                    .expect("live bytes of one block cannot exceed usize")
            })
    }
}
