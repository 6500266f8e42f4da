//! Demonstrates the three allocation tiers of a device memory pool: reuse of
//! released regions, bump allocation from existing blocks, and growth through
//! the external allocator.

use device_pool::DevicePool;
use testing::FakeDeviceAllocator;

fn main() {
    let pool = DevicePool::new(FakeDeviceAllocator::new());

    // Pre-provision one block so the first requests do not each pay for an
    // expensive device allocation.
    pool.add(1024).expect("fake allocator cannot fail");
    println!(
        "provisioned: {} bytes across {} block(s)",
        pool.capacity(),
        pool.block_count()
    );

    // Bump allocations carve the block front to back.
    let first = pool.allocate(100).expect("block has space");
    let second = pool.allocate(200).expect("block has space");
    println!(
        "bump-allocated {} bytes at {} and {} bytes at {}",
        first.size(),
        first.offset(),
        second.size(),
        second.offset()
    );

    // A released region is handed out again before any fresh carving - and
    // it keeps its original extent, so the grant can exceed the request.
    first.release().expect("first release of this region");
    let reused = pool.allocate(50).expect("reuses the released region");
    println!(
        "requested 50, granted {} at offset {} (reused region)",
        reused.size(),
        reused.offset()
    );

    // A request beyond all existing capacity grows the pool by one block.
    let big = pool.allocate(4096).expect("fake allocator cannot fail");
    println!(
        "grew to {} blocks for a {}-byte request",
        pool.block_count(),
        big.size()
    );

    println!(
        "live: {} allocations, {} of {} bytes free",
        pool.len(),
        pool.free_bytes(),
        pool.capacity()
    );
}
