//! Arena store behavior: growth, accounting, irreclaimability.

use chunkstore::{Allocator, BumpAllocator, Store, Strategy};

#[test]
fn chunk_growth_and_accounting_are_exact() {
    let mut arena = BumpAllocator::new(4096).unwrap();

    // 10 bytes round to 12 and come out of the first chunk.
    arena.allocate(10).unwrap();
    assert_eq!(arena.current_data_size(), 12);
    assert_eq!(arena.tail_free(), 4084);
    assert_eq!(arena.stats().chunks_created, 1);

    // 4090 rounds to 4092; the 4084 bytes left in the tail are not
    // enough, so a fresh max(4096, 4092) = 4096-byte chunk appears.
    arena.allocate(4090).unwrap();
    assert_eq!(arena.current_data_size(), 12 + 4092);
    assert_eq!(arena.stats().chunks_created, 2);
    assert_eq!(arena.tail_free(), 4);
}

#[test]
fn deallocate_never_changes_accounting() {
    let mut arena = BumpAllocator::new(1024).unwrap();
    let sizes = [1usize, 8, 13, 100, 3];
    let expected: usize = sizes.iter().map(|s| (s + 3) & !3).sum();

    let ptrs = sizes.map(|s| arena.allocate(s).unwrap());
    assert_eq!(arena.current_data_size(), expected);

    for ptr in ptrs {
        unsafe { arena.deallocate(ptr) };
    }
    assert_eq!(arena.current_data_size(), expected);
    assert_eq!(arena.stats().deallocations, 0);
}

#[test]
fn only_the_tail_chunk_is_carved() {
    let mut arena = BumpAllocator::new(64).unwrap();
    arena.allocate(40).unwrap(); // chunk 1, 24 bytes left
    arena.allocate(60).unwrap(); // does not fit, chunk 2
    assert_eq!(arena.stats().chunks_created, 2);

    // 20 bytes would fit chunk 1's leftover, but the arena only ever
    // looks at the most recently created chunk.
    arena.allocate(20).unwrap();
    assert_eq!(arena.stats().chunks_created, 3);
}

#[test]
fn allocations_within_a_chunk_are_sequential() {
    let mut arena = BumpAllocator::new(256).unwrap();
    let a = arena.allocate(10).unwrap();
    let b = arena.allocate(10).unwrap();
    let c = arena.allocate(10).unwrap();

    assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 12);
    assert_eq!(c.as_ptr() as usize - b.as_ptr() as usize, 12);
}

#[test]
fn factory_static_store_behaves_like_direct_construction() {
    let mut store = Store::new(Strategy::Static, 4096, 0).unwrap();
    store.allocate(10).unwrap();
    assert_eq!(store.current_data_size(), 12);
    assert_eq!(store.block_size(), 0);
}
