//! Unit tests for heap addresses and slot locations

use core_types::{
    align_up, BufferPtr, CellPtr, HeapAddr, NurseryAddr, TenuredAddr, ValueSlot, CELL_ALIGNMENT,
};

#[test]
fn test_align_up_is_cell_aligned() {
    for size in 0..64 {
        let aligned = align_up(size);
        assert_eq!(aligned % CELL_ALIGNMENT, 0);
        assert!(aligned >= size);
        assert!(aligned - size < CELL_ALIGNMENT);
    }
}

#[test]
fn test_nursery_addresses_order_by_chunk_then_offset() {
    assert!(NurseryAddr::new(0, 4088) < NurseryAddr::new(1, 0));
    assert!(NurseryAddr::new(1, 8) < NurseryAddr::new(1, 16));
}

#[test]
fn test_cell_ptr_generation() {
    let young = CellPtr::Nursery(NurseryAddr::new(0, 0));
    let old = CellPtr::Tenured(TenuredAddr(2));
    assert!(young.is_nursery());
    assert_eq!(young.as_tenured(), None);
    assert_eq!(old.as_tenured(), Some(TenuredAddr(2)));
    assert_eq!(old.to_string(), "tenured#2");
}

#[test]
fn test_buffer_ptr_default_is_empty() {
    assert_eq!(BufferPtr::default(), BufferPtr::Empty);
    assert!(!BufferPtr::Empty.is_nursery());
    assert_eq!(BufferPtr::Heap(HeapAddr(0x20)).as_heap(), Some(HeapAddr(0x20)));
}

#[test]
fn test_inline_elements_slot_follows_owner() {
    let young = CellPtr::Nursery(NurseryAddr::new(0, 0));
    let old = CellPtr::Tenured(TenuredAddr(0));

    let inline_young = ValueSlot::Buffer {
        buffer: BufferPtr::Fixed(young),
        index: 0,
    };
    let inline_old = ValueSlot::Buffer {
        buffer: BufferPtr::Fixed(old),
        index: 0,
    };
    assert!(inline_young.is_in_nursery());
    assert!(!inline_old.is_in_nursery());
}
