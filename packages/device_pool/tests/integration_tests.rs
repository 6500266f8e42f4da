//! Integration tests for the `device_pool` package.
//!
//! These exercise whole allocation workflows through the thread-safe
//! [`DevicePool`], including growth, reuse, error paths and cross-thread
//! sharing.

use std::num::NonZero;
use std::sync::Arc;
use std::thread;

use device_pool::{DevicePool, Error, PagedAllocator, RawDevicePool};
use testing::FakeDeviceAllocator;

#[test]
fn empty_pool_first_allocation() {
    let pool = DevicePool::new(FakeDeviceAllocator::new());

    let allocation = pool.allocate(10).unwrap();

    assert_eq!(allocation.size(), 10);
    assert_eq!(pool.len(), 1);
    assert_eq!(
        pool.free_bytes(),
        pool.capacity().checked_sub(10).unwrap()
    );
}

#[test]
fn release_restores_the_whole_pool() {
    let pool = DevicePool::new(FakeDeviceAllocator::new());

    let allocation = pool.allocate(10).unwrap();
    allocation.release().unwrap();

    assert_eq!(pool.len(), 0);
    assert_eq!(pool.free_bytes(), pool.capacity());
}

#[test]
fn growth_is_triggered_only_when_no_block_fits() {
    let pool = DevicePool::new(FakeDeviceAllocator::new());
    pool.add(100).unwrap();

    let _first = pool.allocate(40).unwrap();
    let _second = pool.allocate(40).unwrap();
    assert_eq!(pool.block_count(), 1);

    // 20 bytes of bump space remain; a third 40-byte request must grow.
    let _third = pool.allocate(40).unwrap();
    assert_eq!(pool.block_count(), 2);
    assert_eq!(pool.capacity(), 140);
}

#[test]
fn reuse_is_preferred_over_untouched_bump_space() {
    let pool = DevicePool::new(FakeDeviceAllocator::new());
    pool.add(1000).unwrap();

    let original = pool.allocate(50).unwrap();
    let offset = original.offset();
    original.release().unwrap();

    // Plenty of untouched space remains, but the released region wins.
    let reused = pool.allocate(30).unwrap();

    assert_eq!(reused, original);
    assert_eq!(reused.offset(), offset);
    assert_eq!(reused.size(), 50);
    assert_eq!(pool.free_bytes(), 950);
}

#[test]
fn allocation_failure_propagates_and_changes_nothing() {
    let pool = DevicePool::new(FakeDeviceAllocator::failing_after(1));
    pool.add(100).unwrap();

    let result = pool.allocate(500);

    assert!(matches!(result, Err(Error::Allocation(_))));
    assert_eq!(pool.capacity(), 100);
    assert_eq!(pool.free_bytes(), 100);
    assert_eq!(pool.len(), 0);
}

#[test]
fn zero_byte_allocation_is_invalid() {
    let pool = DevicePool::new(FakeDeviceAllocator::new());

    assert!(matches!(
        pool.allocate(0),
        Err(Error::InvalidSize { size: 0 })
    ));
    assert!(matches!(pool.add(0), Err(Error::InvalidSize { size: 0 })));
}

#[test]
fn double_release_fails_once() {
    let pool = DevicePool::new(FakeDeviceAllocator::new());

    let allocation = pool.allocate(10).unwrap();

    allocation.release().unwrap();
    assert!(matches!(allocation.release(), Err(Error::AlreadyReleased)));
    assert_eq!(pool.free_bytes(), pool.capacity());
}

#[test]
fn paged_allocator_pads_pool_growth() {
    let device = Arc::new(FakeDeviceAllocator::new());
    let pool = DevicePool::new(PagedAllocator::new(
        Arc::clone(&device),
        NonZero::new(64).unwrap(),
    ));

    // The pool asks for 64 bytes; the decorator forwards 128.
    let allocation = pool.allocate(64).unwrap();

    assert_eq!(device.requests(), vec![128]);
    assert_eq!(pool.capacity(), 128);
    assert_eq!(allocation.size(), 64);
}

#[test]
fn one_allocator_feeds_many_pools() {
    let device = Arc::new(FakeDeviceAllocator::new());

    let first = DevicePool::new(Arc::clone(&device));
    let second = DevicePool::new(Arc::clone(&device));

    _ = first.allocate(10).unwrap();
    _ = second.allocate(20).unwrap();

    assert_eq!(device.requests(), vec![10, 20]);
    assert_eq!(first.capacity(), 10);
    assert_eq!(second.capacity(), 20);
}

#[test]
fn allocations_snapshot_tracks_releases() {
    let pool = DevicePool::new(FakeDeviceAllocator::new());
    pool.add(100).unwrap();

    let first = pool.allocate(10).unwrap();
    let second = pool.allocate(20).unwrap();
    let third = pool.allocate(30).unwrap();

    second.release().unwrap();

    let live = pool.allocations();
    assert_eq!(live.len(), 2);
    assert!(live.contains(&first));
    assert!(live.contains(&third));
    assert!(!live.contains(&second));
}

#[test]
fn allocate_from_one_thread_release_from_another() {
    let pool = DevicePool::new(FakeDeviceAllocator::new());

    let loader = {
        let pool = pool.clone();
        thread::spawn(move || pool.allocate(256).unwrap())
    };
    let allocation = loader.join().unwrap();

    assert_eq!(pool.len(), 1);

    let renderer = thread::spawn(move || {
        allocation.release().unwrap();
    });
    renderer.join().unwrap();

    assert_eq!(pool.len(), 0);
    assert_eq!(pool.free_bytes(), pool.capacity());
}

#[test]
fn concurrent_churn_keeps_statistics_consistent() {
    let pool = DevicePool::new(FakeDeviceAllocator::new());
    pool.add(64 * 1024).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let pool = pool.clone();
            thread::spawn(move || {
                for round in 0..100 {
                    let size = 1 + (worker * 100 + round) % 128;
                    let allocation = pool.allocate(size).unwrap();
                    assert!(allocation.size() >= size);

                    if round % 2 == 0 {
                        allocation.release().unwrap();
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    // Half of each worker's 100 rounds stay live.
    assert_eq!(pool.len(), 4 * 50);

    let live_bytes: usize = pool.allocations().iter().map(|a| a.size()).sum();
    assert_eq!(
        pool.capacity(),
        pool.free_bytes().checked_add(live_bytes).unwrap()
    );
}

#[test]
fn raw_pool_converts_into_shared_pool() {
    let mut raw = RawDevicePool::new(FakeDeviceAllocator::new());
    raw.add(100).unwrap();
    _ = raw.allocate(10).unwrap();

    // Existing state carries over into the thread-safe wrapper.
    let pool = DevicePool::from(raw);
    assert_eq!(pool.capacity(), 100);
    assert_eq!(pool.len(), 1);
}
