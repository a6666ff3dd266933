//! Variable-size store with boundary-tag coalescing.
//!
//! A chunk's payload is a sequence of variable-size blocks, each
//! preceded by an 8-byte boundary tag, terminated by a zero-size used
//! sentinel tag:
//!
//! ```text
//! [size|used][data ...][size|used][data ...][0|used]
//!   tag        block      tag       block    sentinel
//! ```
//!
//! Freeing a block merges every contiguous run of free blocks into one,
//! reclaiming one tag's worth of bytes per merge boundary, so
//! fragmentation only ever spans blocks that are still live. A chunk
//! whose free counter climbs back to its total payload is unlinked and
//! returned to the host.
//!
//! ## Invariants
//!
//! - Tag offsets stay 4-aligned: the chunk base is 8-aligned, tags are
//!   8 bytes, and every block size is 4-aligned
//! - The sentinel tag always sits at offset `total + TAG_BYTES`
//! - `free` equals the sum of free block sizes; after every coalescing
//!   pass no two free blocks are adjacent
//! - A zero-size tag is only ever the sentinel

use core::ptr::NonNull;
use std::collections::VecDeque;

use tracing::trace;

use super::{Allocator, AllocatorStats};
use crate::chunk::ChunkBuf;
use crate::error::{AllocError, AllocResult};
use crate::utils::{align4, align_down};

/// Boundary tag: a `u32` block size followed by a `u32` used flag.
const TAG_BYTES: usize = 8;

/// Largest chunk payload a tag can describe, kept 4-aligned and with
/// room for the initial block tag and the sentinel.
const MAX_PAYLOAD: usize = align_down(u32::MAX as usize, 4) - 2 * TAG_BYTES;

struct DynChunk {
    buf: ChunkBuf,
    /// Payload: the size of the single free block the chunk starts as.
    total: usize,
    /// Sum of free block sizes.
    free: usize,
}

impl DynChunk {
    fn new(payload: usize) -> AllocResult<Self> {
        debug_assert!(payload > 0 && payload % 4 == 0 && payload <= MAX_PAYLOAD);
        let buf = ChunkBuf::new(payload + 2 * TAG_BYTES)?;
        let chunk = Self {
            buf,
            total: payload,
            free: payload,
        };
        chunk.write_tag(0, payload, false);
        chunk.write_tag(TAG_BYTES + payload, 0, true);
        Ok(chunk)
    }

    fn read_tag(&self, off: usize) -> (usize, bool) {
        // SAFETY: tag offsets come from walking this chunk's own block
        // list, which keeps them 4-aligned and at least one tag short
        // of the buffer end.
        unsafe {
            (
                self.buf.read_u32(off) as usize,
                self.buf.read_u32(off + 4) != 0,
            )
        }
    }

    fn write_tag(&self, off: usize, size: usize, used: bool) {
        debug_assert!(size <= MAX_PAYLOAD);
        // SAFETY: same contract as read_tag.
        unsafe {
            self.buf.write_u32(off, size as u32);
            self.buf.write_u32(off + 4, used as u32);
        }
    }

    /// First free block of at least `size` bytes, as `(off, block_size)`.
    fn find_fit(&self, size: usize) -> Option<(usize, usize)> {
        let mut off = 0;
        loop {
            let (bsize, used) = self.read_tag(off);
            if bsize == 0 {
                debug_assert!(used, "zero-size tag must be the sentinel");
                return None;
            }
            if !used && bsize >= size {
                return Some((off, bsize));
            }
            off += TAG_BYTES + bsize;
        }
    }

    /// Block whose data starts at `data_off`, as `(off, size, used)`.
    fn find_block(&self, data_off: usize) -> Option<(usize, usize, bool)> {
        let mut off = 0;
        loop {
            let (bsize, used) = self.read_tag(off);
            if bsize == 0 {
                return None;
            }
            match (off + TAG_BYTES).cmp(&data_off) {
                core::cmp::Ordering::Equal => return Some((off, bsize, used)),
                core::cmp::Ordering::Greater => return None,
                core::cmp::Ordering::Less => off += TAG_BYTES + bsize,
            }
        }
    }

    /// Marks the free block at `off` used, splitting it when the
    /// leftover is big enough to stand alone. Returns the data pointer
    /// and the bytes charged against the free counter's block total.
    fn take(&mut self, off: usize, bsize: usize, size: usize) -> (NonNull<u8>, usize) {
        debug_assert!(bsize >= size);
        let charged = if bsize > size + TAG_BYTES {
            self.write_tag(off, size, true);
            self.write_tag(off + TAG_BYTES + size, bsize - size - TAG_BYTES, false);
            self.free -= size + TAG_BYTES;
            size
        } else {
            // Too small to split: consume the whole block so no
            // unusable sliver is left behind, charging its full size.
            self.write_tag(off, bsize, true);
            self.free -= bsize;
            bsize
        };
        // SAFETY: the data offset is inside the payload area.
        (unsafe { self.buf.at(off + TAG_BYTES) }, charged)
    }

    /// Merges every contiguous run of free blocks into one block,
    /// crediting one reclaimed tag per merge boundary.
    fn coalesce(&mut self) {
        let mut off = 0;
        loop {
            let (bsize, used) = self.read_tag(off);
            if bsize == 0 {
                break;
            }
            if used {
                off += TAG_BYTES + bsize;
                continue;
            }
            let mut merged = bsize;
            loop {
                let (next_size, next_used) = self.read_tag(off + TAG_BYTES + merged);
                if next_used {
                    break;
                }
                debug_assert!(next_size > 0);
                merged += TAG_BYTES + next_size;
                self.free += TAG_BYTES;
            }
            if merged != bsize {
                self.write_tag(off, merged, false);
            }
            off += TAG_BYTES + merged;
        }
    }

    /// Walks the whole block list and re-checks the bookkeeping.
    #[cfg(debug_assertions)]
    fn check_consistency(&self) {
        let mut off = 0;
        let mut free_sum = 0;
        let mut prev_free = false;
        loop {
            let (bsize, used) = self.read_tag(off);
            if bsize == 0 {
                assert!(used, "zero-size tag must be the sentinel");
                break;
            }
            if !used {
                assert!(!prev_free, "adjacent free blocks survived coalescing");
                free_sum += bsize;
            }
            prev_free = !used;
            off += TAG_BYTES + bsize;
        }
        assert_eq!(off, TAG_BYTES + self.total, "sentinel drifted");
        assert_eq!(free_sum, self.free, "free counter disagrees with tags");
    }
}

/// Variable-size store with boundary tags and free-block coalescing
///
/// Serves any size from a shared set of chunks, reclaiming space as
/// soon as neighboring blocks free up. New chunks are sized
/// `max(default_chunk_size, request)`, so a request never fails purely
/// by size.
pub struct CoalescingAllocator {
    chunks: VecDeque<DynChunk>,
    default_chunk_size: usize,
    stats: AllocatorStats,
}

impl CoalescingAllocator {
    /// Creates a store that grows in chunks of `default_chunk_size`
    /// payload bytes (rounded to the 4-byte boundary).
    ///
    /// # Errors
    /// [`AllocError::InvalidConfig`] when the size is zero or past what
    /// a boundary tag can describe.
    pub fn new(default_chunk_size: usize) -> AllocResult<Self> {
        if default_chunk_size == 0 {
            return Err(AllocError::InvalidConfig {
                reason: "default chunk size must be nonzero",
            });
        }
        if default_chunk_size > MAX_PAYLOAD {
            return Err(AllocError::InvalidConfig {
                reason: "default chunk size exceeds tag-representable payload",
            });
        }
        Ok(Self {
            chunks: VecDeque::new(),
            default_chunk_size: align4(default_chunk_size),
            stats: AllocatorStats::default(),
        })
    }

    fn alloc_from_new_chunk(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        let payload = self.default_chunk_size.max(size);
        let mut chunk = DynChunk::new(payload)?;
        let (ptr, charged) = chunk.take(0, payload, size);
        trace!(bytes = payload, "created chunk");
        self.stats.record_chunk_created();
        // Chunks at least the default size go to the tail, away from
        // the head where the normal-size chunks keep scan locality.
        if payload >= self.default_chunk_size {
            self.chunks.push_back(chunk);
        } else {
            self.chunks.push_front(chunk);
        }
        self.stats.record_allocation(charged);
        Ok(ptr)
    }
}

impl Allocator for CoalescingAllocator {
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        if size > MAX_PAYLOAD {
            return Err(AllocError::ExceedsMaxSize {
                requested: size,
                max: MAX_PAYLOAD,
            });
        }
        let size = align4(size);

        for chunk in &mut self.chunks {
            // Aggregate free bytes are a fast pre-filter only:
            // fragmentation can pass it while no single block fits, in
            // which case the scan moves on to the next chunk.
            if chunk.free < size {
                continue;
            }
            if let Some((off, bsize)) = chunk.find_fit(size) {
                let (ptr, charged) = chunk.take(off, bsize, size);
                self.stats.record_allocation(charged);
                return Ok(ptr);
            }
        }

        self.alloc_from_new_chunk(size)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        let Some(idx) = self.chunks.iter().position(|c| c.buf.contains(ptr)) else {
            debug_assert!(false, "pointer does not belong to this store");
            return;
        };
        let chunk = &mut self.chunks[idx];
        let data_off = chunk.buf.offset_of(ptr);
        let Some((off, bsize, used)) = chunk.find_block(data_off) else {
            debug_assert!(false, "no block starts at this pointer");
            return;
        };
        // A repeated free is not guarded here: the caller owns that
        // contract, and violating it corrupts the free counter.
        debug_assert!(used, "block freed twice");

        chunk.write_tag(off, bsize, false);
        chunk.free += bsize;
        chunk.coalesce();
        #[cfg(debug_assertions)]
        chunk.check_consistency();

        let drained = chunk.free == chunk.total;
        self.stats.record_deallocation(bsize);
        if drained {
            drop(self.chunks.remove(idx));
            trace!("released drained chunk");
            self.stats.record_chunk_released();
        }
    }

    fn default_chunk_size(&self) -> usize {
        self.default_chunk_size
    }

    fn set_default_chunk_size(&mut self, size: usize) -> usize {
        // Clamp before rounding so the rounding itself cannot overflow.
        let size = align4(size.min(MAX_PAYLOAD));
        core::mem::replace(&mut self.default_chunk_size, size)
    }

    fn stats(&self) -> AllocatorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_leaves_a_free_remainder() {
        let mut store = CoalescingAllocator::new(256).unwrap();
        let a = store.allocate(32).unwrap();
        let b = store.allocate(32).unwrap();

        // Blocks are adjacent modulo one tag.
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 32 + TAG_BYTES);
        assert_eq!(store.stats().chunks_created, 1);
    }

    #[test]
    fn whole_block_is_consumed_when_split_would_leave_a_sliver() {
        let mut store = CoalescingAllocator::new(40).unwrap();
        // Chunk payload 40; a 36-byte request leaves 4 bytes, too small
        // for a tag plus data, so the full 40 are charged.
        let ptr = store.allocate(36).unwrap();
        assert_eq!(store.stats().bytes_in_use, 40);

        unsafe { store.deallocate(ptr) };
        assert_eq!(store.stats().bytes_in_use, 0);
        assert_eq!(store.stats().chunks_released, 1);
    }

    #[test]
    fn free_then_allocate_reuses_the_block() {
        let mut store = CoalescingAllocator::new(256).unwrap();
        let a = store.allocate(32).unwrap();
        let _b = store.allocate(32).unwrap();

        unsafe { store.deallocate(a) };
        let again = store.allocate(32).unwrap();
        assert_eq!(again, a);
        assert_eq!(store.stats().chunks_created, 1);
    }

    #[test]
    fn adjacent_free_blocks_merge_into_one() {
        let mut store = CoalescingAllocator::new(256).unwrap();
        let first = store.allocate(32).unwrap();
        let middle = store.allocate(32).unwrap();
        let _last = store.allocate(32).unwrap();

        unsafe {
            store.deallocate(middle);
            store.deallocate(first);
        }

        // The merged block is 32 + 8 + 32 = 72 bytes: a 68-byte request
        // fits it exactly (consume-whole path) and returns the first
        // block's address without growing the chunk list.
        let merged = store.allocate(68).unwrap();
        assert_eq!(merged, first);
        assert_eq!(store.stats().chunks_created, 1);
    }

    #[test]
    fn zero_or_oversize_config_is_rejected() {
        assert!(CoalescingAllocator::new(0).is_err());
        assert!(CoalescingAllocator::new(usize::MAX).is_err());
    }
}
