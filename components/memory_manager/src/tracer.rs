//! Tracing collaborators: object tracer and root enumeration.
//!
//! A tracer reports the *locations* of an object's outgoing pointers as
//! [`ValueSlot`]s. The collector reads each location, decides whether its
//! target must move, and writes the updated pointer back, so the tracer never
//! holds a borrow into the heap while objects are being relocated.

use core_types::{BufferPtr, CellPtr, Value, ValueSlot};

use crate::object::JsObject;

/// Enumerates the pointer slots of an object.
pub trait Tracer {
    /// Calls `visit` with every slot of `object` (stored at `cell`) that
    /// holds a reference to another cell.
    fn trace_children(&self, object: &JsObject, cell: CellPtr, visit: &mut dyn FnMut(ValueSlot));
}

/// Tracer for the standard object layout.
///
/// Fixed slots are reported individually (this covers inline elements);
/// dynamic slots up to the shape's slot span and elements up to the
/// initialized length are reported as buffer entries. Typed array storage
/// holds raw data and is never traced out of line.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectTracer;

impl Tracer for ObjectTracer {
    fn trace_children(&self, object: &JsObject, cell: CellPtr, visit: &mut dyn FnMut(ValueSlot)) {
        for (index, value) in object.fixed_slots.iter().enumerate() {
            if value.is_object() {
                visit(ValueSlot::Fixed {
                    cell,
                    index: index as u32,
                });
            }
        }

        if object.slots != BufferPtr::Empty {
            for index in 0..object.num_dynamic_slots() {
                visit(ValueSlot::Buffer {
                    buffer: object.slots,
                    index: index as u32,
                });
            }
        }

        if object.is_array() && !object.has_fixed_elements() && object.elements != BufferPtr::Empty
        {
            for index in 0..object.elements_header.initialized_length {
                visit(ValueSlot::Buffer {
                    buffer: object.elements,
                    index,
                });
            }
        }
    }
}

/// Supplies the root set of a collection.
pub trait RootEnumerator {
    /// Calls `visit` with every root slot. The collector may overwrite the
    /// value to point at an object's new location.
    fn trace_roots(&mut self, visit: &mut dyn FnMut(&mut Value));
}

impl RootEnumerator for [Value] {
    fn trace_roots(&mut self, visit: &mut dyn FnMut(&mut Value)) {
        for value in self.iter_mut() {
            visit(value);
        }
    }
}

impl RootEnumerator for Vec<Value> {
    fn trace_roots(&mut self, visit: &mut dyn FnMut(&mut Value)) {
        self.as_mut_slice().trace_roots(visit);
    }
}

/// Root set grouped the way a runtime registers its roots.
#[derive(Debug, Default, Clone)]
pub struct RootSet {
    /// Values on the mutator's stack
    pub stack: Vec<Value>,
    /// Long-lived roots held by the embedding (debugger, caches, wrappers)
    pub persistent: Vec<Value>,
}

impl RootSet {
    /// Creates an empty root set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a stack root and returns its index.
    pub fn push(&mut self, value: Value) -> usize {
        self.stack.push(value);
        self.stack.len() - 1
    }

    /// Registers a persistent root and returns its index.
    pub fn add_persistent(&mut self, value: Value) -> usize {
        self.persistent.push(value);
        self.persistent.len() - 1
    }

    /// Total number of roots.
    pub fn len(&self) -> usize {
        self.stack.len() + self.persistent.len()
    }

    /// Returns true if there are no roots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RootEnumerator for RootSet {
    fn trace_roots(&mut self, visit: &mut dyn FnMut(&mut Value)) {
        self.stack.trace_roots(visit);
        self.persistent.trace_roots(visit);
    }
}
