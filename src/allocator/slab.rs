//! Fixed block-size slab pool.
//!
//! Every allocation is one slot of the configured block size. A chunk
//! stores one occupancy flag byte per slot followed by the slot
//! storage:
//!
//! ```text
//! [flag0 flag1 .. flagN-1][slot0][slot1]...[slotN-1]
//!    0 = free, 1 = used      each block_size bytes
//! ```
//!
//! Allocation is first-fit twice over: the first chunk with any free
//! slot wins, then the first free flag inside it. A chunk whose slots
//! all free up again is unlinked and returned to the host.
//!
//! ## Invariants
//!
//! - `free_slots` always equals the number of zero flags in the chunk
//! - The flag area length equals the chunk's slot count, which is the
//!   default capacity rounded by the same 4-byte helper used for byte
//!   sizes (the count/byte conflation is deliberate; capacity 5 means
//!   8 slots)
//! - Slot pointers are `base + capacity + slot * block_size`, 4-aligned
//!   because both the capacity and the block size are

use core::ptr::NonNull;
use std::collections::VecDeque;

use tracing::trace;

use super::{Allocator, AllocatorStats};
use crate::chunk::ChunkBuf;
use crate::error::{AllocError, AllocResult};
use crate::utils::align4;

struct SlabChunk {
    buf: ChunkBuf,
    /// Slot count; also the byte length of the flag area.
    capacity: usize,
    free_slots: usize,
}

impl SlabChunk {
    fn new(capacity: usize, block_size: usize) -> AllocResult<Self> {
        let len = chunk_len(capacity, block_size).ok_or(AllocError::ExceedsMaxSize {
            requested: capacity,
            max: usize::MAX / block_size,
        })?;
        let buf = ChunkBuf::new(len)?;
        Ok(Self {
            buf,
            capacity,
            free_slots: capacity,
        })
    }

    fn first_free_slot(&self) -> Option<usize> {
        // SAFETY: every slot index is below capacity, which is within
        // the buffer's flag area.
        (0..self.capacity).find(|&slot| unsafe { self.buf.read_byte(slot) } == 0)
    }

    fn take_slot(&mut self, slot: usize, block_size: usize) -> NonNull<u8> {
        debug_assert!(slot < self.capacity && self.free_slots > 0);
        // SAFETY: slot is below capacity; the slot storage starts at
        // offset `capacity` and every slot lies inside the buffer by
        // construction of chunk_len.
        unsafe {
            debug_assert_eq!(self.buf.read_byte(slot), 0);
            self.buf.write_byte(slot, 1);
            self.free_slots -= 1;
            self.buf.at(self.capacity + slot * block_size)
        }
    }

    fn slot_is_free(&self, slot: usize) -> bool {
        debug_assert!(slot < self.capacity);
        // SAFETY: slot is below capacity per the assert above.
        unsafe { self.buf.read_byte(slot) == 0 }
    }

    fn release_slot(&mut self, slot: usize) {
        debug_assert!(slot < self.capacity && !self.slot_is_free(slot));
        // SAFETY: slot is below capacity per the assert above.
        unsafe { self.buf.write_byte(slot, 0) };
        self.free_slots += 1;
    }
}

/// Total chunk byte length for a capacity/block-size pair, or `None`
/// on arithmetic overflow.
fn chunk_len(capacity: usize, block_size: usize) -> Option<usize> {
    capacity
        .checked_mul(block_size)
        .and_then(|storage| storage.checked_add(capacity))
}

/// Fixed block-size slab pool
///
/// All requests are served from equally sized slots; anything larger
/// than one block is an error. Repeated frees of the same slot are
/// tolerated as no-ops.
pub struct SlabAllocator {
    chunks: VecDeque<SlabChunk>,
    block_size: usize,
    /// Slot count for future chunks.
    default_capacity: usize,
    stats: AllocatorStats,
}

impl SlabAllocator {
    /// Creates a pool of `block_size`-byte slots, `capacity` slots per
    /// chunk. Both values are rounded with the 4-byte helper.
    ///
    /// # Errors
    /// [`AllocError::InvalidConfig`] when either value is zero or the
    /// resulting chunk byte length overflows.
    pub fn new(block_size: usize, capacity: usize) -> AllocResult<Self> {
        if block_size == 0 {
            return Err(AllocError::InvalidConfig {
                reason: "block size must be nonzero",
            });
        }
        if capacity == 0 {
            return Err(AllocError::InvalidConfig {
                reason: "chunk capacity must be nonzero",
            });
        }
        let block_size = align4(block_size);
        let capacity = align4(capacity);
        if chunk_len(capacity, block_size).is_none() {
            return Err(AllocError::InvalidConfig {
                reason: "chunk byte length overflows",
            });
        }
        Ok(Self {
            chunks: VecDeque::new(),
            block_size,
            default_capacity: capacity,
            stats: AllocatorStats::default(),
        })
    }
}

impl Allocator for SlabAllocator {
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        // The block size is 4-aligned, so comparing the raw size is
        // equivalent to comparing the rounded one and cannot overflow.
        if size > self.block_size {
            return Err(AllocError::BlockTooLarge {
                requested: size,
                block_size: self.block_size,
            });
        }

        let block_size = self.block_size;
        for chunk in &mut self.chunks {
            if chunk.free_slots == 0 {
                continue;
            }
            if let Some(slot) = chunk.first_free_slot() {
                let ptr = chunk.take_slot(slot, block_size);
                self.stats.record_allocation(block_size);
                return Ok(ptr);
            }
            debug_assert!(false, "free-slot counter disagrees with flag array");
        }

        if self.default_capacity == 0 {
            return Err(AllocError::InvalidConfig {
                reason: "default chunk capacity is zero",
            });
        }
        let mut chunk = SlabChunk::new(self.default_capacity, block_size)?;
        let ptr = chunk.take_slot(0, block_size);
        trace!(
            slots = chunk.capacity,
            block_size, "created slab chunk"
        );
        self.stats.record_chunk_created();
        // A fresh chunk is the one guaranteed source of free slots, so
        // it goes to the front of the scan order.
        self.chunks.push_front(chunk);
        self.stats.record_allocation(block_size);
        Ok(ptr)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        let Some(idx) = self.chunks.iter().position(|c| c.buf.contains(ptr)) else {
            debug_assert!(false, "pointer does not belong to this store");
            return;
        };
        let chunk = &mut self.chunks[idx];
        let off = chunk.buf.offset_of(ptr);
        if off < chunk.capacity {
            debug_assert!(false, "pointer lands in the flag area");
            return;
        }

        let slot = (off - chunk.capacity) / self.block_size;
        debug_assert!(slot < chunk.capacity);
        if chunk.slot_is_free(slot) {
            // Repeated free of the same slot is tolerated as a no-op.
            return;
        }

        chunk.release_slot(slot);
        self.stats.record_deallocation(self.block_size);
        if chunk.free_slots == chunk.capacity {
            drop(self.chunks.remove(idx));
            trace!("released drained slab chunk");
            self.stats.record_chunk_released();
        }
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn default_chunk_size(&self) -> usize {
        self.default_capacity
    }

    fn set_default_chunk_size(&mut self, size: usize) -> usize {
        core::mem::replace(&mut self.default_capacity, align4(size))
    }

    fn stats(&self) -> AllocatorStats {
        self.stats
    }
}
