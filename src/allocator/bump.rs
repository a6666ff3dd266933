//! Chunk-growing bump arena.
//!
//! The arena only ever moves forward: each allocation carves bytes off
//! the unused tail of the most recently created chunk, and a request
//! that does not fit there grows the chunk list instead of searching
//! older chunks. Individual frees are no-ops; every chunk goes back to
//! the host together when the store is dropped.
//!
//! ## Invariants
//!
//! - The chunk list is append-only; only the tail chunk is ever carved
//! - A chunk's carve offset is `len - free` and only moves forward
//! - `current_data_size` counts every rounded size ever handed out and
//!   never decreases, regardless of `deallocate` calls

use core::ptr::NonNull;

use tracing::trace;

use super::{Allocator, AllocatorStats};
use crate::chunk::ChunkBuf;
use crate::error::{AllocError, AllocResult};
use crate::utils::align4;

struct BumpChunk {
    buf: ChunkBuf,
    /// Unused bytes remaining at the tail.
    free: usize,
}

impl BumpChunk {
    fn new(len: usize) -> AllocResult<Self> {
        let buf = ChunkBuf::new(len)?;
        Ok(Self { buf, free: len })
    }

    fn carve(&mut self, size: usize) -> NonNull<u8> {
        debug_assert!(size > 0 && size <= self.free);
        let off = self.buf.len() - self.free;
        self.free -= size;
        // SAFETY: size <= free, so off + size <= len and off is in bounds.
        unsafe { self.buf.at(off) }
    }
}

/// Chunk-growing bump arena
///
/// Zero per-allocation overhead traded for total irreclaimability:
/// the right fit for arena-scoped lifetimes such as one store per
/// parse pass, dropped wholesale when the pass ends.
pub struct BumpAllocator {
    /// Append-only; the last element is the only carve target.
    chunks: Vec<BumpChunk>,
    default_chunk_size: usize,
    data_size: usize,
    stats: AllocatorStats,
}

impl BumpAllocator {
    /// Creates an arena that grows in chunks of `default_chunk_size`
    /// bytes (rounded to the 4-byte boundary).
    ///
    /// # Errors
    /// [`AllocError::InvalidConfig`] when `default_chunk_size` is zero.
    pub fn new(default_chunk_size: usize) -> AllocResult<Self> {
        if default_chunk_size == 0 {
            return Err(AllocError::InvalidConfig {
                reason: "default chunk size must be nonzero",
            });
        }
        Ok(Self {
            chunks: Vec::new(),
            default_chunk_size: align4(default_chunk_size),
            data_size: 0,
            stats: AllocatorStats::default(),
        })
    }

    /// Bytes still unused at the tail chunk; 0 before the first chunk.
    #[inline]
    pub fn tail_free(&self) -> usize {
        self.chunks.last().map_or(0, |c| c.free)
    }

    fn alloc_from_new_chunk(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        let len = self.default_chunk_size.max(size);
        let mut chunk = BumpChunk::new(len)?;
        let ptr = chunk.carve(size);
        trace!(bytes = len, "created arena chunk");
        self.stats.record_chunk_created();
        self.chunks.push(chunk);
        Ok(ptr)
    }
}

impl Allocator for BumpAllocator {
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        if size > isize::MAX as usize {
            return Err(AllocError::HostExhausted { bytes: size });
        }
        let size = align4(size);

        let ptr = match self.chunks.last_mut() {
            Some(tail) if tail.free >= size => tail.carve(size),
            _ => self.alloc_from_new_chunk(size)?,
        };
        self.data_size += size;
        self.stats.record_allocation(size);
        Ok(ptr)
    }

    unsafe fn deallocate(&mut self, _ptr: NonNull<u8>) {
        // Arena storage is never reclaimed per allocation; memory goes
        // back to the host only when the whole store is dropped.
    }

    fn default_chunk_size(&self) -> usize {
        self.default_chunk_size
    }

    fn set_default_chunk_size(&mut self, size: usize) -> usize {
        core::mem::replace(&mut self.default_chunk_size, align4(size))
    }

    fn current_data_size(&self) -> usize {
        self.data_size
    }

    fn stats(&self) -> AllocatorStats {
        self.stats
    }
}
