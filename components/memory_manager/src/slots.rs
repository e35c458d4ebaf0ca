//! Payload allocation for dynamic slots and elements.
//!
//! Small payloads of nursery objects are bump-allocated inline in the nursery
//! right next to their owners and die with them. Payloads above the inline
//! threshold, or that do not fit the remaining nursery space, come from the
//! general heap and are tracked in the [`HugeSlotsRegistry`] until their owner
//! is promoted (ownership moves to the tenured copy) or swept (the buffer is
//! freed). Objects outside the nursery always use the general heap, since
//! tenured memory must never point at nursery-internal buffers.

use std::collections::HashSet;

use core_types::{align_up, BufferPtr, CellPtr, GcResult, HeapAddr, Value, ValueSlot, SLOT_SIZE};

use crate::context::GcContext;
use crate::nursery::NurseryCell;
use crate::tenured::TenuredAllocator;

/// General-heap payloads owned by nursery objects.
#[derive(Debug, Default)]
pub struct HugeSlotsRegistry {
    entries: HashSet<HeapAddr>,
}

impl HugeSlotsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `addr`.
    ///
    /// If the registry cannot grow the buffer is left untracked and the
    /// failure is logged. The buffer stays usable; it is only leaked if its
    /// owner dies before promotion.
    ///
    /// # Returns
    /// True if the buffer is now tracked
    pub fn insert(&mut self, addr: HeapAddr) -> bool {
        if self.entries.try_reserve(1).is_err() {
            log::warn!("huge slots registry is out of memory; leaking {}", addr);
            return false;
        }
        self.entries.insert(addr);
        true
    }

    /// Unregisters `addr`. Returns true if it was registered.
    pub fn remove(&mut self, addr: HeapAddr) -> bool {
        self.entries.remove(&addr)
    }

    /// Returns true if `addr` is registered.
    pub fn contains(&self, addr: HeapAddr) -> bool {
        self.entries.contains(&addr)
    }

    /// Number of registered buffers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns every registered address.
    pub fn drain(&mut self) -> Vec<HeapAddr> {
        self.entries.drain().collect()
    }
}

impl<A: TenuredAllocator> GcContext<A> {
    /// Allocates a dynamic slot buffer of `count` values for `owner`.
    ///
    /// # Arguments
    /// * `owner` - Object the buffer belongs to
    /// * `count` - Number of slots
    ///
    /// # Returns
    /// `BufferPtr::Empty` for zero slots, otherwise the new buffer
    pub fn allocate_slots(&mut self, owner: CellPtr, count: usize) -> GcResult<BufferPtr> {
        self.allocate_buffer(owner, count)
    }

    /// Allocates an element buffer of `count` entries for `owner`.
    pub fn allocate_elements(&mut self, owner: CellPtr, count: usize) -> GcResult<BufferPtr> {
        self.allocate_buffer(owner, count)
    }

    fn allocate_buffer(&mut self, owner: CellPtr, count: usize) -> GcResult<BufferPtr> {
        if count == 0 {
            return Ok(BufferPtr::Empty);
        }
        if !owner.is_nursery() {
            return Ok(BufferPtr::Heap(self.malloc.allocate(count)?));
        }
        if count > self.config.max_nursery_slots {
            return self.allocate_huge(count);
        }

        match self.nursery.try_allocate(align_up(count * SLOT_SIZE))? {
            Some(addr) => {
                self.nursery
                    .replace_cell(addr, NurseryCell::Buffer(vec![Value::Undefined; count]))?;
                Ok(BufferPtr::Nursery(addr))
            }
            None => self.allocate_huge(count),
        }
    }

    fn allocate_huge(&mut self, count: usize) -> GcResult<BufferPtr> {
        let addr = self.malloc.allocate(count)?;
        self.huge_slots.insert(addr);
        log::trace!("allocated huge payload of {} slots at {}", count, addr);
        Ok(BufferPtr::Heap(addr))
    }

    /// Resizes a dynamic slot buffer of `owner` from `old_count` to
    /// `new_count` values.
    ///
    /// # Returns
    /// The buffer now holding the slots, which may differ from `old`
    pub fn reallocate_slots(
        &mut self,
        owner: CellPtr,
        old: BufferPtr,
        old_count: usize,
        new_count: usize,
    ) -> GcResult<BufferPtr> {
        self.reallocate_buffer(owner, old, old_count, new_count)
    }

    /// Resizes an element buffer of `owner` from `old_count` to `new_count`
    /// entries.
    ///
    /// Inline elements that no longer fit move out of line.
    pub fn reallocate_elements(
        &mut self,
        owner: CellPtr,
        old: BufferPtr,
        old_count: usize,
        new_count: usize,
    ) -> GcResult<BufferPtr> {
        self.reallocate_buffer(owner, old, old_count, new_count)
    }

    fn reallocate_buffer(
        &mut self,
        owner: CellPtr,
        old: BufferPtr,
        old_count: usize,
        new_count: usize,
    ) -> GcResult<BufferPtr> {
        match old {
            BufferPtr::Empty => self.allocate_buffer(owner, new_count),
            BufferPtr::Heap(addr) => {
                let new_addr = self.malloc.reallocate(addr, new_count)?;
                let new = BufferPtr::Heap(new_addr);
                if new_addr != addr {
                    if self.huge_slots.remove(addr) {
                        self.huge_slots.insert(new_addr);
                    }
                    self.record_moved_edges(new, old_count.min(new_count))?;
                }
                Ok(new)
            }
            BufferPtr::Nursery(_) | BufferPtr::Fixed(_) => {
                if new_count <= old_count {
                    if let BufferPtr::Nursery(_) = old {
                        self.buffer_mut(old)?.truncate(new_count);
                    }
                    return Ok(old);
                }

                let new = self.allocate_buffer(owner, new_count)?;
                let contents: Vec<Value> = self
                    .buffer(old)?
                    .iter()
                    .take(old_count)
                    .cloned()
                    .collect();
                self.buffer_mut(new)?[..contents.len()].clone_from_slice(&contents);

                // Inline elements vacate the fixed slots they occupied.
                if let BufferPtr::Fixed(_) = old {
                    self.buffer_mut(old)?.fill(Value::Undefined);
                }
                self.record_moved_edges(new, contents.len())?;
                Ok(new)
            }
        }
    }

    /// Re-runs the post-write barrier over the first `count` entries of a
    /// buffer that just received the contents of a moved one.
    ///
    /// Store buffer edges name the old location, which no longer holds the
    /// values, so nursery pointers copied into tenured-owned memory must be
    /// recorded under their new slots.
    fn record_moved_edges(&mut self, buffer: BufferPtr, count: usize) -> GcResult<()> {
        let mut young = Vec::new();
        for (index, value) in self.buffer(buffer)?.iter().take(count).enumerate() {
            if value.is_nursery_object() {
                young.push(ValueSlot::Buffer {
                    buffer,
                    index: index as u32,
                });
            }
        }
        for slot in young {
            if self.is_tenured_location(slot) {
                self.store_buffer.put(slot);
            }
        }
        Ok(())
    }

    /// Takes note of a payload the caller allocated for `owner`.
    ///
    /// A general-heap buffer handed to a nursery object is registered as
    /// huge, so it is freed if the object dies in the nursery.
    pub fn notify_initial_slots(&mut self, owner: CellPtr, buffer: BufferPtr) {
        match buffer {
            BufferPtr::Heap(addr) if owner.is_nursery() => {
                self.huge_slots.insert(addr);
            }
            _ => {}
        }
    }
}
