//! Store implementations and the factory that selects between them.
//!
//! Four strategies share the [`Allocator`] capability interface:
//!
//! - [`SystemAllocator`]: pass-through to the host allocator
//! - [`BumpAllocator`]: chunk-growing arena, frees are no-ops
//! - [`SlabAllocator`]: fixed block-size pool with occupancy flags
//! - [`CoalescingAllocator`]: variable-size blocks with boundary tags
//!
//! [`Store::new`] is the single entry point selecting a variant by
//! [`Strategy`] tag plus chunk/block size parameters.

mod stats;
mod traits;

pub mod bump;
pub mod coalescing;
pub mod slab;
pub mod system;

pub use bump::BumpAllocator;
pub use coalescing::CoalescingAllocator;
pub use slab::SlabAllocator;
pub use stats::AllocatorStats;
pub use system::SystemAllocator;
pub use traits::Allocator;

use core::ptr::NonNull;

use crate::error::AllocResult;

/// Strategy tag understood by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Pass-through to the host allocator; no bookkeeping.
    Default,
    /// Chunk-growing bump arena; lives until the store is dropped.
    Static,
    /// Fixed block-size slab pool.
    Fixed,
    /// Variable-size blocks with boundary-tag coalescing.
    Dynamic,
}

/// A store produced by the factory: exactly one concrete strategy
/// behind the shared capability interface.
///
/// The store is exclusively owned by its caller; dropping it destroys
/// every chunk it still holds. There is no explicit release call and
/// no double-release hazard; single ownership is the type system's
/// job here.
///
/// # Examples
/// ```
/// use chunkstore::{Allocator, Store, Strategy};
///
/// let mut store = Store::new(Strategy::Fixed, 64, 16)?;
/// let ptr = store.allocate(16)?;
/// unsafe { store.deallocate(ptr) };
/// # Ok::<(), chunkstore::AllocError>(())
/// ```
pub enum Store {
    /// Host pass-through.
    Default(SystemAllocator),
    /// Bump arena.
    Static(BumpAllocator),
    /// Slab pool.
    Fixed(SlabAllocator),
    /// Coalescing store.
    Dynamic(CoalescingAllocator),
}

impl Store {
    /// Creates a store for `strategy`.
    ///
    /// `chunk_size` is the default chunk size for `Static` and
    /// `Dynamic`, the per-chunk slot capacity for `Fixed`, and ignored
    /// for `Default`. `block_size` is consulted only for `Fixed`.
    ///
    /// # Errors
    /// [`InvalidConfig`](crate::AllocError::InvalidConfig) when
    /// `chunk_size` is zero for the three chunked strategies, or
    /// `block_size` is zero for `Fixed`.
    pub fn new(strategy: Strategy, chunk_size: usize, block_size: usize) -> AllocResult<Self> {
        match strategy {
            Strategy::Default => Ok(Self::Default(SystemAllocator::new())),
            Strategy::Static => Ok(Self::Static(BumpAllocator::new(chunk_size)?)),
            Strategy::Fixed => Ok(Self::Fixed(SlabAllocator::new(block_size, chunk_size)?)),
            Strategy::Dynamic => Ok(Self::Dynamic(CoalescingAllocator::new(chunk_size)?)),
        }
    }

    /// The strategy this store was created with.
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Default(_) => Strategy::Default,
            Self::Static(_) => Strategy::Static,
            Self::Fixed(_) => Strategy::Fixed,
            Self::Dynamic(_) => Strategy::Dynamic,
        }
    }
}

impl Allocator for Store {
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        match self {
            Self::Default(s) => s.allocate(size),
            Self::Static(s) => s.allocate(size),
            Self::Fixed(s) => s.allocate(size),
            Self::Dynamic(s) => s.allocate(size),
        }
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        // SAFETY: forwarded contract; ptr came from this store's
        // allocate, which dispatched to the same variant.
        match self {
            Self::Default(s) => unsafe { s.deallocate(ptr) },
            Self::Static(s) => unsafe { s.deallocate(ptr) },
            Self::Fixed(s) => unsafe { s.deallocate(ptr) },
            Self::Dynamic(s) => unsafe { s.deallocate(ptr) },
        }
    }

    fn block_size(&self) -> usize {
        match self {
            Self::Default(s) => s.block_size(),
            Self::Static(s) => s.block_size(),
            Self::Fixed(s) => s.block_size(),
            Self::Dynamic(s) => s.block_size(),
        }
    }

    fn default_chunk_size(&self) -> usize {
        match self {
            Self::Default(s) => s.default_chunk_size(),
            Self::Static(s) => s.default_chunk_size(),
            Self::Fixed(s) => s.default_chunk_size(),
            Self::Dynamic(s) => s.default_chunk_size(),
        }
    }

    fn set_default_chunk_size(&mut self, size: usize) -> usize {
        match self {
            Self::Default(s) => s.set_default_chunk_size(size),
            Self::Static(s) => s.set_default_chunk_size(size),
            Self::Fixed(s) => s.set_default_chunk_size(size),
            Self::Dynamic(s) => s.set_default_chunk_size(size),
        }
    }

    fn current_data_size(&self) -> usize {
        match self {
            Self::Default(s) => s.current_data_size(),
            Self::Static(s) => s.current_data_size(),
            Self::Fixed(s) => s.current_data_size(),
            Self::Dynamic(s) => s.current_data_size(),
        }
    }

    fn stats(&self) -> AllocatorStats {
        match self {
            Self::Default(s) => s.stats(),
            Self::Static(s) => s.stats(),
            Self::Fixed(s) => s.stats(),
            Self::Dynamic(s) => s.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_reports_the_selected_strategy() {
        let store = Store::new(Strategy::Dynamic, 256, 0).unwrap();
        assert_eq!(store.strategy(), Strategy::Dynamic);
    }

    #[test]
    fn factory_rejects_zero_chunk_size_for_chunked_strategies() {
        assert!(Store::new(Strategy::Static, 0, 0).is_err());
        assert!(Store::new(Strategy::Fixed, 0, 16).is_err());
        assert!(Store::new(Strategy::Dynamic, 0, 0).is_err());
        // The pass-through ignores both parameters.
        assert!(Store::new(Strategy::Default, 0, 0).is_ok());
    }
}
