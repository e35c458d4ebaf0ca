//! Promotion of surviving nursery objects into the tenured heap.
//!
//! Moving an object allocates a tenured cell, copies the object across,
//! relocates its payloads, and leaves a forwarding record in the vacated
//! nursery cell. The tenured copy is queued on the session's fixup worklist so
//! the driver can later trace its children, which may still point into the
//! nursery.

use std::collections::VecDeque;

use core_types::{
    BufferPtr, CellPtr, GcError, GcResult, NurseryAddr, TenuredAddr, Value, ValueSlot, SLOT_SIZE,
};

use crate::context::GcContext;
use crate::nursery::{NurseryCell, RelocationOverlay};
use crate::object::{AllocKind, JsObject, ObjectClass};
use crate::tenured::TenuredAllocator;

/// State scoped to a single minor collection.
#[derive(Debug, Default)]
pub struct MinorCollectionSession {
    /// Tenured copies whose children have not been traced yet, oldest first
    pub(crate) fixups: VecDeque<TenuredAddr>,
    /// Bytes that became resident in the tenured heap
    pub(crate) tenured_size: usize,
    /// Number of objects promoted
    pub(crate) promoted: usize,
}

impl MinorCollectionSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes promoted so far, counting copied payloads.
    pub fn tenured_size(&self) -> usize {
        self.tenured_size
    }

    /// Number of objects promoted so far.
    pub fn promoted(&self) -> usize {
        self.promoted
    }

    /// Number of tenured copies still waiting to be traced.
    pub fn pending_fixups(&self) -> usize {
        self.fixups.len()
    }
}

/// A relocation cannot be unwound once forwarding records exist.
fn fatal_promotion_oom(src: NurseryAddr, what: &str) -> ! {
    log::error!("out of memory allocating {} while promoting {}", what, src);
    std::process::abort()
}

impl<A: TenuredAllocator> GcContext<A> {
    /// Size class the tenured copy of `object` gets.
    ///
    /// An array whose elements already live in the general heap only needs
    /// its header moved, so it gets the smallest kind. Other arrays are sized
    /// from their element capacity to keep their elements inline.
    pub(crate) fn tenured_kind(object: &JsObject) -> AllocKind {
        match object.class {
            ObjectClass::Array => match object.elements {
                BufferPtr::Heap(_) => AllocKind::Object0,
                _ => AllocKind::for_array(object.elements_header.capacity as usize),
            },
            _ => object.kind,
        }
    }

    /// Returns true if `value` names a nursery object that still has to move.
    ///
    /// `location` is where the value was found; `None` for roots outside the
    /// heap. Values stored inside the nursery are never promoted through that
    /// location, and already forwarded objects only need their pointer
    /// updated.
    pub fn should_move_to_tenured(&self, location: Option<ValueSlot>, value: &Value) -> bool {
        match value.as_nursery() {
            Some(addr) => {
                !location.is_some_and(|slot| slot.is_in_nursery())
                    && self.nursery.forwarded(addr).is_none()
            }
            None => false,
        }
    }

    /// Points `value` at the tenured copy of its target, promoting the
    /// target first if needed.
    ///
    /// # Returns
    /// True if `value` was rewritten
    pub(crate) fn update_or_move(
        &mut self,
        session: &mut MinorCollectionSession,
        location: Option<ValueSlot>,
        value: &mut Value,
    ) -> GcResult<bool> {
        let Some(addr) = value.as_nursery() else {
            return Ok(false);
        };
        if location.is_some_and(|slot| slot.is_in_nursery()) {
            return Ok(false);
        }

        let dst = if self.should_move_to_tenured(location, value) {
            self.move_to_tenured(session, addr)?
        } else if let Some(dst) = self.nursery.forwarded(addr) {
            dst
        } else {
            return Ok(false);
        };
        *value = Value::Object(CellPtr::Tenured(dst));
        Ok(true)
    }

    /// Moves the nursery object at `src` into the tenured heap.
    ///
    /// Aborts the process if the tenured heap or the general heap cannot
    /// provide memory for the copy.
    ///
    /// # Arguments
    /// * `session` - Collection the move belongs to
    /// * `src` - Address of a live nursery object
    ///
    /// # Returns
    /// Address of the tenured copy
    pub(crate) fn move_to_tenured(
        &mut self,
        session: &mut MinorCollectionSession,
        src: NurseryAddr,
    ) -> GcResult<TenuredAddr> {
        let kind = Self::tenured_kind(self.nursery.object(src)?);
        let NurseryCell::Object(mut object) =
            self.nursery.replace_cell(src, NurseryCell::Uninitialized)?
        else {
            return Err(GcError::InvalidNurseryAddress(src));
        };

        let Some(dst) = self.tenured.allocate(kind) else {
            fatal_promotion_oom(src, "a tenured cell");
        };

        let fixed = JsObject::fixed_capacity(object.class, kind);
        object.kind = kind;
        object.fixed_slots.resize(fixed, Value::Undefined);

        let mut copied = self.move_slots_to_tenured(src, &mut object)?;
        copied += self.move_elements_to_tenured(src, dst, &mut object)?;

        self.tenured.initialize(dst, object)?;
        self.nursery.replace_cell(
            src,
            NurseryCell::Forwarded(RelocationOverlay { new_location: dst }),
        )?;
        session.fixups.push_back(dst);
        session.tenured_size += kind.thing_size() + copied;
        session.promoted += 1;

        log::trace!("promoted {} -> {} ({:?}, {} payload bytes)", src, dst, kind, copied);
        Ok(dst)
    }

    /// Relocates the dynamic slots of a promoted object.
    ///
    /// # Returns
    /// Bytes copied into the general heap
    fn move_slots_to_tenured(&mut self, src: NurseryAddr, object: &mut JsObject) -> GcResult<usize> {
        match object.slots {
            BufferPtr::Nursery(_) => {
                let count = object.num_dynamic_slots();
                let values: Vec<Value> = self
                    .buffer(object.slots)?
                    .iter()
                    .take(count)
                    .cloned()
                    .collect();
                if values.is_empty() {
                    object.slots = BufferPtr::Empty;
                    object.slot_capacity = 0;
                    return Ok(0);
                }
                let copied = values.len() * SLOT_SIZE;
                object.slot_capacity = values.len() as u32;
                object.slots = self.copy_to_general_heap(src, values);
                Ok(copied)
            }
            BufferPtr::Heap(addr) => {
                self.huge_slots.remove(addr);
                Ok(0)
            }
            BufferPtr::Empty | BufferPtr::Fixed(_) => Ok(0),
        }
    }

    /// Relocates the elements of a promoted object.
    ///
    /// Inline elements follow the cell. Nursery element buffers are moved
    /// inline when they fit the tenured cell's fixed capacity and copied to
    /// the general heap otherwise.
    ///
    /// # Returns
    /// Bytes copied into the general heap
    fn move_elements_to_tenured(
        &mut self,
        src: NurseryAddr,
        dst: TenuredAddr,
        object: &mut JsObject,
    ) -> GcResult<usize> {
        match object.elements {
            BufferPtr::Fixed(_) => {
                object.elements = BufferPtr::Fixed(CellPtr::Tenured(dst));
                Ok(0)
            }
            BufferPtr::Heap(addr) => {
                self.huge_slots.remove(addr);
                Ok(0)
            }
            BufferPtr::Nursery(_) => {
                let count = object.element_slots();
                let values: Vec<Value> = self
                    .buffer(object.elements)?
                    .iter()
                    .take(count)
                    .cloned()
                    .collect();

                let inline = object.num_fixed_slots();
                if object.kind != AllocKind::Object0 && values.len() <= inline {
                    object.fixed_slots[..values.len()].clone_from_slice(&values);
                    object.elements = BufferPtr::Fixed(CellPtr::Tenured(dst));
                    if object.is_array() {
                        object.elements_header.capacity = inline as u32;
                    }
                    return Ok(0);
                }

                let copied = values.len() * SLOT_SIZE;
                object.elements = self.copy_to_general_heap(src, values);
                Ok(copied)
            }
            BufferPtr::Empty => Ok(0),
        }
    }

    fn copy_to_general_heap(&mut self, src: NurseryAddr, values: Vec<Value>) -> BufferPtr {
        match self.malloc.allocate_from(values) {
            Ok(addr) => BufferPtr::Heap(addr),
            Err(_) => fatal_promotion_oom(src, "a payload buffer"),
        }
    }
}
