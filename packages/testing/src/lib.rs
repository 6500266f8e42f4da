//! Private helpers shared by the tests, benchmarks and examples of the
//! device pool packages. Not published; everything in here may change
//! without notice.

use std::sync::Mutex;

use device_pool::{AllocationError, DeviceAllocator, DeviceMemory};

/// Device memory that exists only as a recorded size.
///
/// Stands in for a driver buffer in tests - the pool never inspects memory
/// beyond its size, so nothing needs to be backed by real storage.
#[derive(Debug)]
pub struct FakeMemory {
    size: usize,
}

impl FakeMemory {
    /// Creates a fake memory block reporting the given size.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl DeviceMemory for FakeMemory {
    fn size(&self) -> usize {
        self.size
    }
}

/// A deterministic in-process device allocator for tests.
///
/// Records every size requested from it, and can be configured to grant more
/// or fewer bytes than requested or to start failing after a number of
/// successful allocations. The default configuration grants exactly what was
/// asked for and never fails.
#[derive(Debug)]
pub struct FakeDeviceAllocator {
    state: Mutex<State>,

    /// Extra bytes granted on top of every request.
    surplus: usize,

    /// Bytes withheld from every request, to simulate a misbehaving device
    /// that grants undersized blocks.
    deficit: usize,
}

#[derive(Debug)]
struct State {
    /// Every size requested from this allocator, in call order.
    requests: Vec<usize>,

    /// Successful allocations remaining before the allocator starts
    /// failing. `None` means it never fails.
    remaining: Option<usize>,
}

impl FakeDeviceAllocator {
    /// An allocator that grants exactly what is requested and never fails.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(0, 0, None)
    }

    /// An allocator that grants `surplus` extra bytes on every request,
    /// like a device with coarse allocation granularity.
    #[must_use]
    pub fn with_surplus(surplus: usize) -> Self {
        Self::with_config(surplus, 0, None)
    }

    /// An allocator that grants `deficit` fewer bytes than requested -
    /// behavior the pool must treat as an allocation failure.
    #[must_use]
    pub fn short_by(deficit: usize) -> Self {
        Self::with_config(0, deficit, None)
    }

    /// An allocator that succeeds `successes` times and fails afterwards,
    /// like a device running out of memory.
    #[must_use]
    pub fn failing_after(successes: usize) -> Self {
        Self::with_config(0, 0, Some(successes))
    }

    fn with_config(surplus: usize, deficit: usize, remaining: Option<usize>) -> Self {
        Self {
            state: Mutex::new(State {
                requests: Vec::new(),
                remaining,
            }),
            surplus,
            deficit,
        }
    }

    /// Every size requested from this allocator so far, in call order.
    ///
    /// Failed requests are not recorded.
    #[must_use]
    pub fn requests(&self) -> Vec<usize> {
        self.state
            .lock()
            .expect("fake allocator state lock poisoned")
            .requests
            .clone()
    }
}

impl Default for FakeDeviceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceAllocator for FakeDeviceAllocator {
    type Memory = FakeMemory;

    fn allocate(&self, size: usize) -> Result<FakeMemory, AllocationError> {
        let mut state = self
            .state
            .lock()
            .expect("fake allocator state lock poisoned");

        match state.remaining {
            Some(0) => return Err(AllocationError::new(size, "fake device exhausted")),
            Some(ref mut remaining) => *remaining = remaining.saturating_sub(1),
            None => {}
        }

        state.requests.push(size);

        let granted = size.saturating_add(self.surplus).saturating_sub(self.deficit);
        Ok(FakeMemory::new(granted))
    }
}
