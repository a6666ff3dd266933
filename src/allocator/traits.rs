//! The capability set shared by every store.

use core::ptr::NonNull;

use super::AllocatorStats;
use crate::error::AllocResult;

/// Capability interface implemented by every allocation strategy.
///
/// A store is exclusively owned by its caller for its whole lifetime:
/// all operations take `&mut self`, nothing is synchronized internally,
/// and dropping the store returns every owned chunk to the host.
///
/// Operations a strategy does not track report zero; the default
/// method bodies encode that so only the strategies with real
/// bookkeeping override them.
pub trait Allocator {
    /// Allocates `size` bytes, rounded up to a 4-byte boundary.
    ///
    /// The returned pointer is at least 4-byte aligned, points at
    /// uninitialized-but-owned memory inside exactly one chunk of this
    /// store, and stays valid until it is passed to
    /// [`deallocate`](Self::deallocate) or the store is dropped.
    ///
    /// # Errors
    /// - [`ZeroSize`](crate::AllocError::ZeroSize) for `size == 0`
    /// - [`BlockTooLarge`](crate::AllocError::BlockTooLarge) when a
    ///   fixed-block store cannot fit the request in one block
    /// - [`HostExhausted`](crate::AllocError::HostExhausted) when the
    ///   host cannot provide a new chunk
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>>;

    /// Returns an allocation to the store.
    ///
    /// Strategy-specific behavior: the arena strategy ignores the call
    /// entirely, the fixed-block strategy tolerates a repeated free of
    /// the same slot as a no-op, and the coalescing strategy merges the
    /// freed block with its free neighbors.
    ///
    /// # Safety
    /// `ptr` must have been returned by this store's
    /// [`allocate`](Self::allocate). For the coalescing strategy it
    /// must not have been freed since: a repeated free is not guarded
    /// and corrupts the store's bookkeeping. The memory must no longer
    /// be read or written after this call.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>);

    /// Fixed block size, or 0 for strategies without one.
    fn block_size(&self) -> usize {
        0
    }

    /// Chunk size used when growing, or 0 for the pass-through.
    fn default_chunk_size(&self) -> usize {
        0
    }

    /// Replaces the default chunk size, returning the previous value.
    ///
    /// A no-op returning 0 for strategies that never grow chunks.
    fn set_default_chunk_size(&mut self, size: usize) -> usize {
        let _ = size;
        0
    }

    /// Accumulated bytes handed out, for strategies that track it.
    ///
    /// Only the arena strategy reports a nonzero value; it counts every
    /// rounded size ever returned and never decreases.
    fn current_data_size(&self) -> usize {
        0
    }

    /// Snapshot of this store's lifetime counters.
    fn stats(&self) -> AllocatorStats;
}
