//! Host allocator pass-through.

use core::ptr::NonNull;

use tracing::warn;

use super::{Allocator, AllocatorStats};
use crate::error::{AllocError, AllocResult};

/// Pass-through to the host allocator
///
/// Every request goes straight to the host; there are no chunks, no
/// size rounding, and no accounting beyond operation counters. All
/// size queries report zero and `set_default_chunk_size` is a no-op.
///
/// The host's `malloc` guarantees alignment well past the 4-byte
/// boundary the capability interface promises.
#[derive(Debug, Default)]
pub struct SystemAllocator {
    stats: AllocatorStats,
}

impl SystemAllocator {
    /// Creates a new pass-through store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Allocator for SystemAllocator {
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        // SAFETY: plain malloc with a nonzero size; the result is
        // null-checked below before use.
        let raw = unsafe { libc::malloc(size) };
        match NonNull::new(raw.cast::<u8>()) {
            Some(ptr) => {
                self.stats.record_allocation(0);
                Ok(ptr)
            }
            None => {
                warn!(bytes = size, "host allocation failed");
                Err(AllocError::HostExhausted { bytes: size })
            }
        }
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        // SAFETY: per the trait contract, ptr came from this store's
        // allocate, i.e. from the host's malloc, and is freed only once.
        unsafe { libc::free(ptr.as_ptr().cast()) };
        self.stats.record_deallocation(0);
    }

    fn stats(&self) -> AllocatorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_usable_memory() {
        let mut store = SystemAllocator::new();
        let ptr = store.allocate(64).unwrap();

        unsafe {
            core::ptr::write_bytes(ptr.as_ptr(), 0x42, 64);
            assert_eq!(*ptr.as_ptr(), 0x42);
            assert_eq!(*ptr.as_ptr().add(63), 0x42);
            store.deallocate(ptr);
        }
    }

    #[test]
    fn zero_size_is_rejected() {
        let mut store = SystemAllocator::new();
        assert_eq!(store.allocate(0), Err(AllocError::ZeroSize));
    }

    #[test]
    fn size_queries_report_zero() {
        let mut store = SystemAllocator::new();
        assert_eq!(store.block_size(), 0);
        assert_eq!(store.default_chunk_size(), 0);
        assert_eq!(store.set_default_chunk_size(4096), 0);
        assert_eq!(store.current_data_size(), 0);
    }

    #[test]
    fn counters_track_operations_but_not_bytes() {
        let mut store = SystemAllocator::new();
        let ptr = store.allocate(16).unwrap();
        assert_eq!(store.stats().allocations, 1);
        assert_eq!(store.stats().bytes_in_use, 0);

        unsafe { store.deallocate(ptr) };
        assert_eq!(store.stats().deallocations, 1);
    }
}
