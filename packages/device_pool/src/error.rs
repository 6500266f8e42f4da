use thiserror::Error;

/// Errors that can occur when requesting or releasing pool memory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller asked the pool for a region of less than one byte.
    ///
    /// This is a caller mistake, not a resource condition - the pool performs
    /// no work and its statistics are unchanged.
    #[error("requested size must be at least 1 byte (got {size})")]
    InvalidSize {
        /// The size the caller passed in.
        size: usize,
    },

    /// The underlying device allocator could not provide a new block.
    ///
    /// The pool does not retry and does not fall back to a smaller request;
    /// its statistics are unchanged by the failed attempt.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// The allocation was already released back to the pool.
    ///
    /// Each granted region may be released exactly once. The region may still
    /// be handed out again later, but only by the pool itself through reuse.
    #[error("the allocation has already been released back to the pool")]
    AlreadyReleased,
}

/// Failure reported by a [`DeviceAllocator`][crate::DeviceAllocator] when it
/// cannot satisfy a block request.
///
/// Allocators construct this via [`AllocationError::new`]. The pool also
/// synthesizes one when an allocator hands back a block smaller than
/// requested, which it treats the same as an outright failure.
#[derive(Debug, Error)]
#[error("device allocation of {requested} bytes failed: {reason}")]
#[non_exhaustive]
pub struct AllocationError {
    requested: usize,
    reason: String,
}

impl AllocationError {
    /// Creates a new allocation error for a request of `requested` bytes.
    ///
    /// # Example
    ///
    /// ```rust
    /// use device_pool::AllocationError;
    ///
    /// let error = AllocationError::new(4096, "device out of memory");
    /// assert_eq!(error.requested(), 4096);
    /// ```
    pub fn new(requested: usize, reason: impl Into<String>) -> Self {
        Self {
            requested,
            reason: reason.into(),
        }
    }

    /// Creates the error the pool uses when an allocator grants fewer bytes
    /// than were requested from it.
    pub(crate) fn undersized(requested: usize, granted: usize) -> Self {
        Self {
            requested,
            reason: format!("allocator granted only {granted} bytes"),
        }
    }

    /// The number of bytes that were requested from the allocator.
    #[must_use]
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// A human-readable description of why the allocation failed.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
