//! Shows how a [`PagedAllocator`] pads block requests to page granularity
//! before they reach the device, and how one shared allocator can feed
//! several pools.

use std::num::NonZero;
use std::sync::Arc;

use device_pool::{DevicePool, PagedAllocator};
use testing::FakeDeviceAllocator;

fn main() {
    let device = Arc::new(FakeDeviceAllocator::new());
    let page_size = NonZero::new(64).expect("64 is not zero");

    // Both pools draw from the same underlying device capability.
    let paged = PagedAllocator::new(Arc::clone(&device), page_size);
    let textures = DevicePool::new(paged.clone());
    let buffers = DevicePool::new(paged);

    let _texture = textures.allocate(100).expect("fake allocator cannot fail");
    let _buffer = buffers.allocate(64).expect("fake allocator cannot fail");

    // 100 bytes round up to 128; 64 bytes are already page-aligned but
    // still gain a page, which is the decorator's documented rounding.
    println!("device saw requests: {:?}", device.requests());
    println!(
        "texture pool capacity: {} bytes, buffer pool capacity: {} bytes",
        textures.capacity(),
        buffers.capacity()
    );
}
