//! Chunked storage allocators for layout-engine workloads.
//!
//! Four interchangeable allocation strategies behind one factory and
//! one capability interface:
//!
//! - [`SystemAllocator`]: pass-through to the host allocator, no
//!   bookkeeping
//! - [`BumpAllocator`]: chunk-growing arena; individual frees are
//!   no-ops and everything is released when the store is dropped
//! - [`SlabAllocator`]: fixed block-size pool using per-chunk
//!   occupancy flags; drained chunks go back to the host
//! - [`CoalescingAllocator`]: variable-size blocks with embedded
//!   boundary tags; adjacent free blocks merge and wholly free chunks
//!   go back to the host
//!
//! Stores are single-threaded by contract: each instance has one
//! logical owner, every operation takes `&mut self`, and nothing is
//! synchronized internally. Request sizes are rounded up to a 4-byte
//! boundary before accounting and returned pointers are at least
//! 4-byte aligned.
//!
//! # Example
//! ```
//! use chunkstore::{Allocator, Store, Strategy};
//!
//! // One arena per parse pass: everything is released at drop.
//! let mut arena = Store::new(Strategy::Static, 4096, 0)?;
//! let ptr = arena.allocate(10)?;
//! assert_eq!(arena.current_data_size(), 12); // rounded to 4 bytes
//!
//! unsafe { arena.deallocate(ptr) }; // no-op for the arena strategy
//! assert_eq!(arena.current_data_size(), 12);
//! # Ok::<(), chunkstore::AllocError>(())
//! ```

#![warn(missing_docs)]

mod chunk;

pub mod allocator;
pub mod error;
pub mod utils;

pub use allocator::{
    Allocator, AllocatorStats, BumpAllocator, CoalescingAllocator, SlabAllocator, Store, Strategy,
    SystemAllocator,
};
pub use error::{AllocError, AllocResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
