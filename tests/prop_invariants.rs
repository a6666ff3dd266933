//! Property tests: alignment and live-allocation disjointness under
//! randomized allocate/free interleavings.

use core::ptr::NonNull;

use chunkstore::{Allocator, Store};
use proptest::prelude::*;

const CHUNKED: [chunkstore::Strategy; 3] = [
    chunkstore::Strategy::Static,
    chunkstore::Strategy::Fixed,
    chunkstore::Strategy::Dynamic,
];

proptest! {
    #[test]
    fn live_allocations_stay_aligned_and_disjoint(
        ops in proptest::collection::vec((1usize..128, any::<u16>()), 1..64),
    ) {
        for strategy in CHUNKED {
            let mut store = Store::new(strategy, 256, 128).unwrap();
            let mut live: Vec<(usize, usize, NonNull<u8>)> = Vec::new();

            for &(size, sel) in &ops {
                let reclaiming = strategy != chunkstore::Strategy::Static;
                if sel % 3 == 0 && reclaiming && !live.is_empty() {
                    let (_, _, ptr) = live.swap_remove(sel as usize % live.len());
                    unsafe { store.deallocate(ptr) };
                    continue;
                }

                let ptr = store.allocate(size).unwrap();
                let addr = ptr.as_ptr() as usize;
                prop_assert_eq!(addr % 4, 0, "{:?} returned a misaligned pointer", strategy);

                let rounded = (size + 3) & !3;
                for &(other_addr, other_size, _) in &live {
                    prop_assert!(
                        addr + rounded <= other_addr || other_addr + other_size <= addr,
                        "{:?} handed out overlapping regions",
                        strategy
                    );
                }

                // Fill the region; debug assertions inside the store
                // would trip if this stomped any bookkeeping.
                unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0xA5, size) };
                live.push((addr, rounded, ptr));
            }

            if strategy != chunkstore::Strategy::Static {
                for (_, _, ptr) in live.drain(..) {
                    unsafe { store.deallocate(ptr) };
                }
                prop_assert_eq!(store.stats().bytes_in_use, 0);
                prop_assert_eq!(store.stats().live_chunks(), 0);
            }
        }
    }
}
